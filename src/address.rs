//! Conversion between logical network addresses and native wire layouts
//!
//! The native component has represented host addresses three different ways
//! over its lifetime: a legacy 4-byte IPv4 field, a 16-byte IPv6 field, and
//! a tagged dual-family tunnel endpoint. Which layouts exist depends on the
//! deployed capability level, so the converter is built from the host's
//! capability descriptor and declines layouts the component cannot produce
//! rather than erroring; callers probe the `can_convert_*` predicates
//! before relying on a conversion.

use crate::capability::CapabilityLevel;
use crate::error::Result;
use crate::marshal::records::FixedRecord;
use bytes::{Buf, BufMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// A version-agnostic host address; `None` means "unspecified"
pub type LogicalAddress = Option<IpAddr>;

/// The closed set of native address layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressLayout {
    /// Legacy fixed-length IPv4-only field
    LegacyIpv4,
    /// IPv6-only field
    Ipv6,
    /// Tagged dual-family tunnel endpoint
    TunnelEndpoint,
}

impl AddressLayout {
    /// Minimum capability level at which the layout exists
    pub fn required_level(self) -> CapabilityLevel {
        match self {
            Self::LegacyIpv4 => CapabilityLevel::Base,
            Self::Ipv6 => CapabilityLevel::Ipv6Aware,
            Self::TunnelEndpoint => CapabilityLevel::TunnelAware,
        }
    }
}

/// Legacy 4-byte IPv4 address field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv4AddressRecord {
    pub octets: [u8; 4],
}

impl Ipv4AddressRecord {
    /// The all-zero "any" address the native convention uses for an
    /// absent value
    pub const ANY: Self = Self { octets: [0; 4] };

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.octets);
    }
}

impl FixedRecord for Ipv4AddressRecord {
    const SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut octets = [0u8; 4];
        octets.copy_from_slice(&bytes[..4]);
        Ok(Self { octets })
    }
}

/// 16-byte IPv6 address field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv6AddressRecord {
    pub octets: [u8; 16],
}

impl Ipv6AddressRecord {
    pub const ANY: Self = Self { octets: [0; 16] };

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.octets);
    }
}

impl FixedRecord for Ipv6AddressRecord {
    const SIZE: usize = 16;

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&bytes[..16]);
        Ok(Self { octets })
    }
}

/// Family tag carried by a tunnel endpoint record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum EndpointFamily {
    /// The endpoint was not negotiated
    #[default]
    Unspecified = 0,
    Ipv4 = 1,
    Ipv6 = 2,
}

impl From<u32> for EndpointFamily {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Ipv4,
            2 => Self::Ipv6,
            // An unrecognized tag means "not negotiated", not an error.
            _ => Self::Unspecified,
        }
    }
}

/// Tagged dual-family tunnel endpoint: family tag plus a fixed 16-byte
/// payload, of which IPv4 uses only the leading 4 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunnelEndpointRecord {
    pub family: EndpointFamily,
    pub payload: [u8; 16],
}

impl TunnelEndpointRecord {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.family as u32);
        buf.put_slice(&self.payload);
    }
}

impl FixedRecord for TunnelEndpointRecord {
    const SIZE: usize = 20;

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        let family = EndpointFamily::from(bytes.get_u32_le());
        let mut payload = [0u8; 16];
        payload.copy_from_slice(&bytes[..16]);
        Ok(Self { family, payload })
    }
}

/// A native address value tagged with its layout, or a textual form
#[derive(Debug, Clone, PartialEq)]
pub enum NativeAddress {
    LegacyIpv4(Ipv4AddressRecord),
    Ipv6(Ipv6AddressRecord),
    TunnelEndpoint(TunnelEndpointRecord),
    Text(String),
}

impl NativeAddress {
    /// The binary layout of this value, `None` for the textual form
    pub fn layout(&self) -> Option<AddressLayout> {
        match self {
            Self::LegacyIpv4(_) => Some(AddressLayout::LegacyIpv4),
            Self::Ipv6(_) => Some(AddressLayout::Ipv6),
            Self::TunnelEndpoint(_) => Some(AddressLayout::TunnelEndpoint),
            Self::Text(_) => None,
        }
    }
}

/// Capability-gated converter between logical addresses and wire layouts
#[derive(Debug, Clone)]
pub struct AddressConverter {
    level: CapabilityLevel,
}

impl AddressConverter {
    /// Build a converter for the deployed capability level
    pub fn new(level: CapabilityLevel) -> Self {
        Self { level }
    }

    pub fn capability_level(&self) -> CapabilityLevel {
        self.level
    }

    /// Whether values in `layout` can be read at this level
    pub fn can_convert_from(&self, layout: AddressLayout) -> bool {
        self.level.supports(layout.required_level())
    }

    /// Whether values can be written in `layout` at this level
    pub fn can_convert_to(&self, layout: AddressLayout) -> bool {
        self.level.supports(layout.required_level())
    }

    /// Produce the logical address for a native value.
    ///
    /// Returns `None` when the value's layout is not supported at this
    /// level or a textual form does not parse; the inner `None` is the
    /// absent address (all-zero fields, unspecified family tags).
    pub fn convert_from(&self, value: &NativeAddress) -> Option<LogicalAddress> {
        if let Some(layout) = value.layout() {
            if !self.can_convert_from(layout) {
                return None;
            }
        }

        match value {
            NativeAddress::LegacyIpv4(rec) => {
                if rec.octets == [0; 4] {
                    Some(None)
                } else {
                    Some(Some(IpAddr::V4(Ipv4Addr::from(rec.octets))))
                }
            }
            NativeAddress::Ipv6(rec) => {
                if rec.octets == [0; 16] {
                    Some(None)
                } else {
                    Some(Some(IpAddr::V6(Ipv6Addr::from(rec.octets))))
                }
            }
            NativeAddress::TunnelEndpoint(rec) => match rec.family {
                EndpointFamily::Unspecified => Some(None),
                EndpointFamily::Ipv4 => {
                    let mut octets = [0u8; 4];
                    octets.copy_from_slice(&rec.payload[..4]);
                    Some(Some(IpAddr::V4(Ipv4Addr::from(octets))))
                }
                EndpointFamily::Ipv6 => Some(Some(IpAddr::V6(Ipv6Addr::from(rec.payload)))),
            },
            NativeAddress::Text(text) => {
                if text.is_empty() {
                    Some(None)
                } else {
                    text.parse::<IpAddr>().ok().map(Some)
                }
            }
        }
    }

    /// Produce the native value in `layout` for a logical address.
    ///
    /// Returns `None` when the layout is not supported at this level. A
    /// family mismatch against a single-family layout resolves to that
    /// layout's all-zero "any" value (the native field is always present
    /// but may be zero), never to a truncated address.
    pub fn convert_to(&self, value: LogicalAddress, layout: AddressLayout) -> Option<NativeAddress> {
        if !self.can_convert_to(layout) {
            return None;
        }

        let converted = match layout {
            AddressLayout::LegacyIpv4 => match value {
                Some(IpAddr::V4(addr)) => NativeAddress::LegacyIpv4(Ipv4AddressRecord {
                    octets: addr.octets(),
                }),
                _ => NativeAddress::LegacyIpv4(Ipv4AddressRecord::ANY),
            },
            AddressLayout::Ipv6 => match value {
                Some(IpAddr::V6(addr)) => NativeAddress::Ipv6(Ipv6AddressRecord {
                    octets: addr.octets(),
                }),
                _ => NativeAddress::Ipv6(Ipv6AddressRecord::ANY),
            },
            AddressLayout::TunnelEndpoint => match value {
                Some(IpAddr::V4(addr)) => {
                    let mut payload = [0u8; 16];
                    payload[..4].copy_from_slice(&addr.octets());
                    NativeAddress::TunnelEndpoint(TunnelEndpointRecord {
                        family: EndpointFamily::Ipv4,
                        payload,
                    })
                }
                Some(IpAddr::V6(addr)) => NativeAddress::TunnelEndpoint(TunnelEndpointRecord {
                    family: EndpointFamily::Ipv6,
                    payload: addr.octets(),
                }),
                None => NativeAddress::TunnelEndpoint(TunnelEndpointRecord::default()),
            },
        };

        Some(converted)
    }
}
