//! Fixed-layout records exchanged with the native component
//!
//! All records are little-endian native layouts. Wide-string fields are
//! fixed-length UTF-16LE arrays, NUL-padded. Encoding exists alongside
//! decoding because the boundary is exercised in-process by simulated
//! components and by the C surface.

use crate::address::{Ipv4AddressRecord, Ipv6AddressRecord, TunnelEndpointRecord};
use crate::error::{RasError, Result};
use crate::marshal::records::{get_utf16_fixed, put_utf16_fixed, FixedRecord};
use crate::native::RasHandle;
use bytes::{Buf, BufMut};

/// Byte length of the fixed entry/device name fields (16 UTF-16 units)
pub const NAME_FIELD_LEN: usize = 32;

/// Byte length of the fixed EAP user name field (32 UTF-16 units)
pub const EAP_NAME_FIELD_LEN: usize = 64;

/// Kind of device backing a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DeviceKind {
    Unknown = 0,
    Modem = 1,
    Isdn = 2,
    Serial = 3,
    Vpn = 4,
    Broadband = 5,
}

impl From<u32> for DeviceKind {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Modem,
            2 => Self::Isdn,
            3 => Self::Serial,
            4 => Self::Vpn,
            5 => Self::Broadband,
            _ => Self::Unknown,
        }
    }
}

impl DeviceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Modem => "modem",
            Self::Isdn => "ISDN",
            Self::Serial => "serial",
            Self::Vpn => "VPN",
            Self::Broadband => "broadband",
        }
    }
}

/// One active connection as enumerated by the component
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub handle: RasHandle,
    pub entry_name: String,
    pub device_kind: DeviceKind,
    pub device_name: String,
}

impl ConnectionRecord {
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_u64_le(self.handle.0);
        put_utf16_fixed(buf, &self.entry_name, NAME_FIELD_LEN)?;
        buf.put_u32_le(self.device_kind as u32);
        put_utf16_fixed(buf, &self.device_name, NAME_FIELD_LEN)?;
        Ok(())
    }
}

impl FixedRecord for ConnectionRecord {
    const SIZE: usize = 8 + NAME_FIELD_LEN + 4 + NAME_FIELD_LEN;

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        let handle = RasHandle(bytes.get_u64_le());
        let entry_name = get_utf16_fixed(&bytes[..NAME_FIELD_LEN])?;
        bytes.advance(NAME_FIELD_LEN);
        let device_kind = DeviceKind::from(bytes.get_u32_le());
        let device_name = get_utf16_fixed(&bytes[..NAME_FIELD_LEN])?;

        Ok(Self {
            handle,
            entry_name,
            device_kind,
            device_name,
        })
    }
}

/// Per-link transfer statistics
///
/// The leading size field identifies the structure revision; a mismatch
/// means the component populated a layout this build does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatistics {
    pub bytes_transmitted: u32,
    pub bytes_received: u32,
    pub frames_transmitted: u32,
    pub frames_received: u32,
    pub crc_errors: u32,
    pub timeout_errors: u32,
    pub alignment_errors: u32,
    pub hardware_overrun_errors: u32,
    pub framing_errors: u32,
    pub buffer_overrun_errors: u32,
    pub compression_ratio_in: u32,
    pub compression_ratio_out: u32,
    pub link_speed_bps: u32,
    pub connect_duration_ms: u32,
}

impl LinkStatistics {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(Self::SIZE as u32);
        buf.put_u32_le(self.bytes_transmitted);
        buf.put_u32_le(self.bytes_received);
        buf.put_u32_le(self.frames_transmitted);
        buf.put_u32_le(self.frames_received);
        buf.put_u32_le(self.crc_errors);
        buf.put_u32_le(self.timeout_errors);
        buf.put_u32_le(self.alignment_errors);
        buf.put_u32_le(self.hardware_overrun_errors);
        buf.put_u32_le(self.framing_errors);
        buf.put_u32_le(self.buffer_overrun_errors);
        buf.put_u32_le(self.compression_ratio_in);
        buf.put_u32_le(self.compression_ratio_out);
        buf.put_u32_le(self.link_speed_bps);
        buf.put_u32_le(self.connect_duration_ms);
    }
}

impl FixedRecord for LinkStatistics {
    const SIZE: usize = 4 + 14 * 4;

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        let size = bytes.get_u32_le();
        if size as usize != Self::SIZE {
            return Err(RasError::CorruptBuffer(format!(
                "Statistics size field {size} does not match the {} byte layout",
                Self::SIZE
            )));
        }

        Ok(Self {
            bytes_transmitted: bytes.get_u32_le(),
            bytes_received: bytes.get_u32_le(),
            frames_transmitted: bytes.get_u32_le(),
            frames_received: bytes.get_u32_le(),
            crc_errors: bytes.get_u32_le(),
            timeout_errors: bytes.get_u32_le(),
            alignment_errors: bytes.get_u32_le(),
            hardware_overrun_errors: bytes.get_u32_le(),
            framing_errors: bytes.get_u32_le(),
            buffer_overrun_errors: bytes.get_u32_le(),
            compression_ratio_in: bytes.get_u32_le(),
            compression_ratio_out: bytes.get_u32_le(),
            link_speed_bps: bytes.get_u32_le(),
            connect_duration_ms: bytes.get_u32_le(),
        })
    }
}

/// PPP IPv4 negotiation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv4ProjectionRecord {
    pub error: u32,
    pub client: Ipv4AddressRecord,
    pub server: Ipv4AddressRecord,
}

impl Ipv4ProjectionRecord {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.error);
        self.client.encode(buf);
        self.server.encode(buf);
    }
}

impl FixedRecord for Ipv4ProjectionRecord {
    const SIZE: usize = 4 + Ipv4AddressRecord::SIZE * 2;

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        let error = bytes.get_u32_le();
        let client = Ipv4AddressRecord::decode(&bytes[..Ipv4AddressRecord::SIZE])?;
        bytes.advance(Ipv4AddressRecord::SIZE);
        let server = Ipv4AddressRecord::decode(&bytes[..Ipv4AddressRecord::SIZE])?;
        Ok(Self {
            error,
            client,
            server,
        })
    }
}

/// PPP IPv6 negotiation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv6ProjectionRecord {
    pub error: u32,
    pub local: Ipv6AddressRecord,
    pub peer: Ipv6AddressRecord,
}

impl Ipv6ProjectionRecord {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.error);
        self.local.encode(buf);
        self.peer.encode(buf);
    }
}

impl FixedRecord for Ipv6ProjectionRecord {
    const SIZE: usize = 4 + Ipv6AddressRecord::SIZE * 2;

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        let error = bytes.get_u32_le();
        let local = Ipv6AddressRecord::decode(&bytes[..Ipv6AddressRecord::SIZE])?;
        bytes.advance(Ipv6AddressRecord::SIZE);
        let peer = Ipv6AddressRecord::decode(&bytes[..Ipv6AddressRecord::SIZE])?;
        Ok(Self { error, local, peer })
    }
}

/// Tunnel endpoint pair negotiated by an IKEv2-style connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunnelProjectionRecord {
    pub error: u32,
    pub local: TunnelEndpointRecord,
    pub remote: TunnelEndpointRecord,
}

impl TunnelProjectionRecord {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.error);
        self.local.encode(buf);
        self.remote.encode(buf);
    }
}

impl FixedRecord for TunnelProjectionRecord {
    const SIZE: usize = 4 + TunnelEndpointRecord::SIZE * 2;

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        let error = bytes.get_u32_le();
        let local = TunnelEndpointRecord::decode(&bytes[..TunnelEndpointRecord::SIZE])?;
        bytes.advance(TunnelEndpointRecord::SIZE);
        let remote = TunnelEndpointRecord::decode(&bytes[..TunnelEndpointRecord::SIZE])?;
        Ok(Self {
            error,
            local,
            remote,
        })
    }
}

/// Stored credentials for a phone-book entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CredentialsRecord {
    /// Bit mask of which fields the component populated
    pub mask: u32,
    pub user_name: String,
    pub domain: String,
    pub password: String,
}

impl CredentialsRecord {
    pub const MASK_USER_NAME: u32 = 0x1;
    pub const MASK_PASSWORD: u32 = 0x2;
    pub const MASK_DOMAIN: u32 = 0x4;

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_u32_le(self.mask);
        put_utf16_fixed(buf, &self.user_name, NAME_FIELD_LEN)?;
        put_utf16_fixed(buf, &self.domain, NAME_FIELD_LEN)?;
        put_utf16_fixed(buf, &self.password, NAME_FIELD_LEN)?;
        Ok(())
    }
}

impl FixedRecord for CredentialsRecord {
    const SIZE: usize = 4 + NAME_FIELD_LEN * 3;

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        let mask = bytes.get_u32_le();
        let user_name = get_utf16_fixed(&bytes[..NAME_FIELD_LEN])?;
        bytes.advance(NAME_FIELD_LEN);
        let domain = get_utf16_fixed(&bytes[..NAME_FIELD_LEN])?;
        bytes.advance(NAME_FIELD_LEN);
        let password = get_utf16_fixed(&bytes[..NAME_FIELD_LEN])?;

        Ok(Self {
            mask,
            user_name,
            domain,
            password,
        })
    }
}

/// EAP identity decoded from a component-allocated block
///
/// Variable-length: a fixed user name field followed by a length-prefixed
/// opaque EAP blob.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EapIdentityRecord {
    pub user_name: String,
    pub eap_data: Vec<u8>,
}

impl EapIdentityRecord {
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        put_utf16_fixed(buf, &self.user_name, EAP_NAME_FIELD_LEN)?;
        buf.put_u32_le(self.eap_data.len() as u32);
        buf.put_slice(&self.eap_data);
        Ok(())
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() < EAP_NAME_FIELD_LEN + 4 {
            return Err(RasError::CorruptBuffer(format!(
                "EAP identity block of {} bytes is shorter than its fixed header",
                bytes.len()
            )));
        }

        let user_name = get_utf16_fixed(&bytes[..EAP_NAME_FIELD_LEN])?;
        bytes.advance(EAP_NAME_FIELD_LEN);
        let blob_len = bytes.get_u32_le() as usize;
        if bytes.remaining() < blob_len {
            return Err(RasError::CorruptBuffer(format!(
                "EAP blob claims {blob_len} bytes but {} remain",
                bytes.remaining()
            )));
        }

        Ok(Self {
            user_name,
            eap_data: bytes[..blob_len].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::EndpointFamily;

    #[test]
    fn test_connection_record_round_trip() {
        let record = ConnectionRecord {
            handle: RasHandle(0xDEAD_BEEF),
            entry_name: "Office VPN".to_string(),
            device_kind: DeviceKind::Vpn,
            device_name: "WAN Miniport".to_string(),
        };

        let mut buf = Vec::new();
        record.encode(&mut buf).expect("encode");
        assert_eq!(buf.len(), ConnectionRecord::SIZE);

        let decoded = ConnectionRecord::decode(&buf).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_statistics_rejects_wrong_size_field() {
        let stats = LinkStatistics {
            bytes_transmitted: 1000,
            connect_duration_ms: 90_000,
            ..Default::default()
        };

        let mut buf = Vec::new();
        stats.encode(&mut buf);
        assert_eq!(buf.len(), LinkStatistics::SIZE);
        assert_eq!(LinkStatistics::decode(&buf).expect("decode"), stats);

        // Corrupt the revision field.
        buf[0] = 0xFF;
        assert!(matches!(
            LinkStatistics::decode(&buf),
            Err(RasError::CorruptBuffer(_))
        ));
    }

    #[test]
    fn test_tunnel_projection_round_trip() {
        let mut payload = [0u8; 16];
        payload[..4].copy_from_slice(&[203, 0, 113, 9]);
        let record = TunnelProjectionRecord {
            error: 0,
            local: TunnelEndpointRecord {
                family: EndpointFamily::Ipv4,
                payload,
            },
            remote: TunnelEndpointRecord::default(),
        };

        let mut buf = Vec::new();
        record.encode(&mut buf);
        assert_eq!(buf.len(), TunnelProjectionRecord::SIZE);
        assert_eq!(
            TunnelProjectionRecord::decode(&buf).expect("decode"),
            record
        );
    }

    #[test]
    fn test_credentials_round_trip() {
        let record = CredentialsRecord {
            mask: CredentialsRecord::MASK_USER_NAME | CredentialsRecord::MASK_DOMAIN,
            user_name: "alex".to_string(),
            domain: "CORP".to_string(),
            password: String::new(),
        };

        let mut buf = Vec::new();
        record.encode(&mut buf).expect("encode");
        assert_eq!(buf.len(), CredentialsRecord::SIZE);
        assert_eq!(CredentialsRecord::decode(&buf).expect("decode"), record);
    }

    #[test]
    fn test_eap_identity_round_trip() {
        let record = EapIdentityRecord {
            user_name: "cert-user".to_string(),
            eap_data: vec![0x13, 0x37, 0x00, 0x42],
        };

        let mut buf = Vec::new();
        record.encode(&mut buf).expect("encode");
        assert_eq!(EapIdentityRecord::decode(&buf).expect("decode"), record);
    }

    #[test]
    fn test_eap_identity_truncated_blob_is_corruption() {
        let record = EapIdentityRecord {
            user_name: "u".to_string(),
            eap_data: vec![1, 2, 3, 4, 5],
        };

        let mut buf = Vec::new();
        record.encode(&mut buf).expect("encode");
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            EapIdentityRecord::decode(&buf),
            Err(RasError::CorruptBuffer(_))
        ));
    }

    #[test]
    fn test_unknown_device_kind_maps_to_unknown() {
        assert_eq!(DeviceKind::from(77), DeviceKind::Unknown);
        assert_eq!(DeviceKind::from(4), DeviceKind::Vpn);
    }
}
