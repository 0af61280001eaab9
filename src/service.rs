//! Connection service over the native call contract
//!
//! Projects the component's fixed-layout records into caller-facing types:
//! buffered calls go through the negotiation loop, counted buffers through
//! the record decoder, and every address field through the capability-gated
//! converter.

use crate::address::{AddressConverter, LogicalAddress};
use crate::capability::CapabilityLevel;
use crate::config::Config;
use crate::error::{RasError, Result};
use crate::marshal::buffer::{CallParams, CountedCallParams};
use crate::marshal::negotiate::{self, RetryPolicy};
use crate::marshal::records::{FixedRecord, RecordSeq};
use crate::native::types::{
    ConnectionRecord, CredentialsRecord, DeviceKind, EapIdentityRecord, Ipv4ProjectionRecord,
    Ipv6ProjectionRecord, LinkStatistics, TunnelProjectionRecord,
};
use crate::native::{
    status, AutodialParam, EapIdentityGuard, ProjectionKind, RasHandle, RasNative,
};

/// One active connection, as surfaced to callers
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveConnection {
    pub handle: RasHandle,
    pub entry_name: String,
    pub device_kind: DeviceKind,
    pub device_name: String,
}

impl From<ConnectionRecord> for ActiveConnection {
    fn from(record: ConnectionRecord) -> Self {
        Self {
            handle: record.handle,
            entry_name: record.entry_name,
            device_kind: record.device_kind,
            device_name: record.device_name,
        }
    }
}

/// Negotiated projection data with addresses in logical form
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionInfo {
    Ipv4 {
        error: u32,
        client: LogicalAddress,
        server: LogicalAddress,
    },
    Ipv6 {
        error: u32,
        local: LogicalAddress,
        peer: LogicalAddress,
    },
    TunnelEndpoints {
        error: u32,
        local: LogicalAddress,
        remote: LogicalAddress,
    },
}

/// EAP identity for a phone-book entry
#[derive(Debug, Clone, PartialEq)]
pub struct EapIdentity {
    pub user_name: String,
    pub eap_data: Vec<u8>,
}

/// Stored credentials for a phone-book entry
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub user_name: String,
    pub domain: String,
    pub password: String,
}

/// Caller-facing service over a native remote access component
pub struct ConnectionService<A: RasNative> {
    api: A,
    converter: AddressConverter,
    policy: RetryPolicy,
    level: CapabilityLevel,
}

impl<A: RasNative> ConnectionService<A> {
    /// Build a service from a validated configuration
    pub fn new(api: A, config: &Config) -> Result<Self> {
        config.validate()?;
        let level = config.capability.level;
        Ok(Self {
            api,
            converter: AddressConverter::new(level),
            policy: RetryPolicy::from(&config.negotiation),
            level,
        })
    }

    /// Build a service with defaults for a given capability level
    pub fn with_level(api: A, level: CapabilityLevel) -> Self {
        Self {
            api,
            converter: AddressConverter::new(level),
            policy: RetryPolicy::default(),
            level,
        }
    }

    pub fn capability_level(&self) -> CapabilityLevel {
        self.level
    }

    pub fn converter(&self) -> &AddressConverter {
        &self.converter
    }

    /// Enumerate the component's active connections
    pub fn active_connections(&self) -> Result<Vec<ActiveConnection>> {
        let mut params = CountedCallParams::new();
        negotiate::run(
            &mut params,
            &self.policy.with_initial_size(ConnectionRecord::SIZE),
            "RasEnumConnections",
            |p| self.api.enum_connections(p),
        )?;

        let seq = RecordSeq::<ConnectionRecord>::from_params(&params);
        let connections = match seq {
            Ok(seq) => seq
                .iter()
                .map(|record| record.map(ActiveConnection::from))
                .collect::<Result<Vec<_>>>(),
            Err(e) => Err(e),
        };
        params.release();

        let connections = connections?;
        log::info!("Enumerated {} active connections", connections.len());
        Ok(connections)
    }

    /// Transfer statistics for one connection
    pub fn link_statistics(&self, handle: RasHandle) -> Result<LinkStatistics> {
        if handle.is_null() {
            return Err(RasError::InvalidParameter(
                "Connection handle cannot be null".to_string(),
            ));
        }

        let mut params = CallParams::new();
        negotiate::run(
            &mut params,
            &self.policy.with_initial_size(LinkStatistics::SIZE),
            "RasGetConnectionStatistics",
            |p| self.api.get_connection_statistics(handle, p),
        )?;

        let stats = decode_single::<LinkStatistics>(&params);
        params.release();
        stats
    }

    /// Negotiated projection data for one connection.
    ///
    /// A projection kind above the active capability level is rejected
    /// deterministically; the component is never asked for a layout it
    /// cannot produce.
    pub fn projection_info(&self, handle: RasHandle, kind: ProjectionKind) -> Result<ProjectionInfo> {
        if handle.is_null() {
            return Err(RasError::InvalidParameter(
                "Connection handle cannot be null".to_string(),
            ));
        }
        if !self.level.supports(kind.required_level()) {
            return Err(RasError::UnsupportedCapability(format!(
                "Projection {kind:?} requires capability level {}, component is {}",
                kind.required_level().as_str(),
                self.level.as_str()
            )));
        }

        let initial = match kind {
            ProjectionKind::Ipv4 => Ipv4ProjectionRecord::SIZE,
            ProjectionKind::Ipv6 => Ipv6ProjectionRecord::SIZE,
            ProjectionKind::TunnelEndpoints => TunnelProjectionRecord::SIZE,
        };

        let mut params = CallParams::new();
        negotiate::run(
            &mut params,
            &self.policy.with_initial_size(initial),
            "RasGetProjectionInfo",
            |p| self.api.get_projection_info(handle, kind, p),
        )?;

        let info = self.decode_projection(kind, &params);
        params.release();
        info
    }

    fn decode_projection(&self, kind: ProjectionKind, params: &CallParams) -> Result<ProjectionInfo> {
        use crate::address::NativeAddress;

        let convert = |native: NativeAddress| -> Result<LogicalAddress> {
            self.converter.convert_from(&native).ok_or_else(|| {
                RasError::UnsupportedCapability(format!(
                    "Address layout {:?} not convertible at level {}",
                    native.layout(),
                    self.level.as_str()
                ))
            })
        };

        match kind {
            ProjectionKind::Ipv4 => {
                let record = decode_single::<Ipv4ProjectionRecord>(params)?;
                Ok(ProjectionInfo::Ipv4 {
                    error: record.error,
                    client: convert(NativeAddress::LegacyIpv4(record.client))?,
                    server: convert(NativeAddress::LegacyIpv4(record.server))?,
                })
            }
            ProjectionKind::Ipv6 => {
                let record = decode_single::<Ipv6ProjectionRecord>(params)?;
                Ok(ProjectionInfo::Ipv6 {
                    error: record.error,
                    local: convert(NativeAddress::Ipv6(record.local))?,
                    peer: convert(NativeAddress::Ipv6(record.peer))?,
                })
            }
            ProjectionKind::TunnelEndpoints => {
                let record = decode_single::<TunnelProjectionRecord>(params)?;
                Ok(ProjectionInfo::TunnelEndpoints {
                    error: record.error,
                    local: convert(NativeAddress::TunnelEndpoint(record.local))?,
                    remote: convert(NativeAddress::TunnelEndpoint(record.remote))?,
                })
            }
        }
    }

    /// EAP identity for a phone-book entry.
    ///
    /// The component allocates the identity block; the guard returns it
    /// through the explicit free operation exactly once, on every exit
    /// path including decode failures.
    pub fn eap_user_identity(&self, entry_name: &str) -> Result<EapIdentity> {
        if entry_name.is_empty() {
            return Err(RasError::InvalidParameter(
                "Entry name cannot be empty".to_string(),
            ));
        }

        let mut out = None;
        let code = self.api.get_eap_user_identity(entry_name, &mut out);
        if code != status::SUCCESS {
            return Err(RasError::NativeCall {
                operation: "RasGetEapUserIdentity",
                code,
            });
        }

        let buffer = out.ok_or_else(|| {
            RasError::CorruptBuffer("Component reported success without an identity block".to_string())
        })?;
        let guard = EapIdentityGuard::new(&self.api, buffer);
        let record = EapIdentityRecord::decode(guard.bytes())?;

        Ok(EapIdentity {
            user_name: record.user_name,
            eap_data: record.eap_data,
        })
    }

    /// Stored credentials for a phone-book entry
    pub fn stored_credentials(&self, entry_name: &str) -> Result<Credentials> {
        if entry_name.is_empty() {
            return Err(RasError::InvalidParameter(
                "Entry name cannot be empty".to_string(),
            ));
        }

        let mut params = CallParams::new();
        negotiate::run(
            &mut params,
            &self.policy.with_initial_size(CredentialsRecord::SIZE),
            "RasGetCredentials",
            |p| self.api.get_credentials(entry_name, p),
        )?;

        let record = decode_single::<CredentialsRecord>(&params);
        params.release();
        let record = record?;

        Ok(Credentials {
            user_name: record.user_name,
            domain: record.domain,
            password: record.password,
        })
    }

    /// Read one autodial parameter
    pub fn autodial_parameter(&self, param: AutodialParam) -> Result<u32> {
        let mut params = CallParams::new();
        negotiate::run(
            &mut params,
            &self.policy.with_initial_size(4),
            "RasGetAutodialParam",
            |p| self.api.get_autodial_param(param, p),
        )?;

        let buf = params.as_slice();
        if buf.len() < 4 {
            params.release();
            return Err(RasError::CorruptBuffer(
                "Autodial parameter buffer is shorter than a value".to_string(),
            ));
        }
        let value = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        params.release();
        Ok(value)
    }

    /// Write one autodial parameter
    pub fn set_autodial_parameter(&self, param: AutodialParam, value: u32) -> Result<()> {
        let code = self.api.set_autodial_param(param, &value.to_le_bytes());
        if code != status::SUCCESS {
            return Err(RasError::NativeCall {
                operation: "RasSetAutodialParam",
                code,
            });
        }
        Ok(())
    }

    /// Whether autodial is enabled for a dialing location
    pub fn autodial_enabled(&self, dialing_location: u32) -> Result<bool> {
        let mut enabled = false;
        let code = self.api.get_autodial_enable(dialing_location, &mut enabled);
        if code != status::SUCCESS {
            return Err(RasError::NativeCall {
                operation: "RasGetAutodialEnable",
                code,
            });
        }
        Ok(enabled)
    }

    /// Enable or disable autodial for a dialing location
    pub fn set_autodial_enabled(&self, dialing_location: u32, enabled: bool) -> Result<()> {
        let code = self.api.set_autodial_enable(dialing_location, enabled);
        if code != status::SUCCESS {
            return Err(RasError::NativeCall {
                operation: "RasSetAutodialEnable",
                code,
            });
        }
        log::info!(
            "Autodial for dialing location {dialing_location} set to {enabled}"
        );
        Ok(())
    }

    /// Terminate the connection behind `handle`
    pub fn hang_up(&self, handle: RasHandle) -> Result<()> {
        if handle.is_null() {
            return Err(RasError::InvalidParameter(
                "Connection handle cannot be null".to_string(),
            ));
        }

        let code = self.api.hang_up(handle);
        if code != status::SUCCESS {
            return Err(RasError::NativeCall {
                operation: "RasHangUp",
                code,
            });
        }
        log::info!("Connection {handle:?} hung up");
        Ok(())
    }
}

/// Decode one fixed record from the front of a populated buffer
fn decode_single<T: FixedRecord>(params: &CallParams) -> Result<T> {
    let buf = params.as_slice();
    if buf.len() < T::SIZE {
        return Err(RasError::CorruptBuffer(format!(
            "Buffer holds {} bytes but the record layout needs {}",
            buf.len(),
            T::SIZE
        )));
    }
    T::decode(&buf[..T::SIZE])
}
