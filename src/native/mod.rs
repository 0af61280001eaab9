//! Native call contract for the remote access component
//!
//! The marshaling layer never calls the operating system directly; it calls
//! through [`RasNative`], a fixed set of entry points with a status-code
//! return convention. Zero denotes success and any nonzero value is a
//! native error code surfaced verbatim to the caller; status 603 ("buffer
//! too small") is the single code the negotiation loop interprets.

pub mod types;

use crate::marshal::buffer::{CallParams, CountedCallParams};

/// Status codes returned by the native remote access component
pub mod status {
    /// The call completed and the buffer holds valid data
    pub const SUCCESS: u32 = 0;
    /// A generic invalid-function code for contract operations the
    /// deployed component does not provide
    pub const ERROR_INVALID_FUNCTION: u32 = 1;
    /// The connection handle is not recognized by the component
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    /// The supplied buffer is too small; the required size has been
    /// written to the in/out count
    pub const ERROR_BUFFER_TOO_SMALL: u32 = 603;
    /// The buffer contents are structurally invalid
    pub const ERROR_BUFFER_INVALID: u32 = 610;
    /// A structure size field does not match any known revision
    pub const ERROR_INVALID_SIZE: u32 = 632;
    /// There is no active connection for the given handle
    pub const ERROR_NO_CONNECTION: u32 = 668;
}

/// Opaque handle to an active remote access connection
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasHandle(pub u64);

impl RasHandle {
    pub const NULL: RasHandle = RasHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Projection protocols a connection may have negotiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// PPP IPv4 negotiation result
    Ipv4,
    /// PPP IPv6 negotiation result
    Ipv6,
    /// IKEv2-style tunnel endpoint pair
    TunnelEndpoints,
}

impl ProjectionKind {
    /// Capability level at which the component can answer this projection
    pub fn required_level(self) -> crate::capability::CapabilityLevel {
        use crate::capability::CapabilityLevel;
        match self {
            Self::Ipv4 => CapabilityLevel::Base,
            Self::Ipv6 => CapabilityLevel::Ipv6Aware,
            Self::TunnelEndpoints => CapabilityLevel::TunnelAware,
        }
    }

    /// Numeric tag used across the native boundary
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Ipv4 => 1,
            Self::Ipv6 => 2,
            Self::TunnelEndpoints => 3,
        }
    }
}

/// Autodial parameters addressable through the component
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutodialParam {
    DisableConnectionQuery = 0,
    LogonSessionDisable = 1,
    SavedAddressesLimit = 2,
    FailedConnectionTimeout = 3,
    ConnectionQueryTimeout = 4,
}

/// An identity block allocated by the native component.
///
/// The component owns the allocation identified by `token`; it must be
/// handed back through [`RasNative::free_eap_user_identity`] exactly once.
#[derive(Debug)]
pub struct EapIdentityBuffer {
    /// Opaque token identifying the native allocation
    pub token: u64,
    /// Encoded identity record read out of the allocation
    pub bytes: Vec<u8>,
}

/// The abstract boundary to the operating-system remote access component.
///
/// Buffered operations receive a parameter record whose buffer they fill;
/// on status 603 they report the required byte count through the record's
/// in/out size. Counted operations additionally report how many fixed-size
/// records the buffer holds.
pub trait RasNative {
    /// Enumerate active connections as fixed-size records
    fn enum_connections(&self, params: &mut CountedCallParams) -> u32;

    /// Per-link transfer statistics for one connection
    fn get_connection_statistics(&self, handle: RasHandle, params: &mut CallParams) -> u32;

    /// Negotiated projection data for one connection and protocol
    fn get_projection_info(
        &self,
        handle: RasHandle,
        kind: ProjectionKind,
        params: &mut CallParams,
    ) -> u32;

    /// Retrieve the EAP identity for a phone-book entry. On success the
    /// component allocates the identity block itself.
    fn get_eap_user_identity(&self, entry_name: &str, out: &mut Option<EapIdentityBuffer>) -> u32;

    /// Release an identity block returned by [`Self::get_eap_user_identity`]
    fn free_eap_user_identity(&self, buffer: EapIdentityBuffer);

    /// Stored credentials for a phone-book entry
    fn get_credentials(&self, entry_name: &str, params: &mut CallParams) -> u32;

    /// Read one autodial parameter value
    fn get_autodial_param(&self, param: AutodialParam, params: &mut CallParams) -> u32;

    /// Write one autodial parameter value
    fn set_autodial_param(&self, param: AutodialParam, value: &[u8]) -> u32;

    /// Whether autodial is enabled for a dialing location
    fn get_autodial_enable(&self, dialing_location: u32, enabled: &mut bool) -> u32;

    /// Enable or disable autodial for a dialing location
    fn set_autodial_enable(&self, dialing_location: u32, enabled: bool) -> u32;

    /// Terminate the connection behind `handle`
    fn hang_up(&self, handle: RasHandle) -> u32;
}

/// Scope guard that returns a native identity allocation exactly once.
///
/// Both the normal path and early `?` returns in the caller release the
/// block through the contract's explicit free operation.
pub struct EapIdentityGuard<'a, A: RasNative + ?Sized> {
    api: &'a A,
    buffer: Option<EapIdentityBuffer>,
}

impl<'a, A: RasNative + ?Sized> EapIdentityGuard<'a, A> {
    pub fn new(api: &'a A, buffer: EapIdentityBuffer) -> Self {
        Self {
            api,
            buffer: Some(buffer),
        }
    }

    /// The encoded identity record
    pub fn bytes(&self) -> &[u8] {
        self.buffer
            .as_ref()
            .map(|b| b.bytes.as_slice())
            .unwrap_or(&[])
    }
}

impl<A: RasNative + ?Sized> Drop for EapIdentityGuard<'_, A> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.api.free_eap_user_identity(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FreeCounter {
        frees: Cell<u32>,
    }

    impl RasNative for FreeCounter {
        fn enum_connections(&self, _: &mut CountedCallParams) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn get_connection_statistics(&self, _: RasHandle, _: &mut CallParams) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn get_projection_info(
            &self,
            _: RasHandle,
            _: ProjectionKind,
            _: &mut CallParams,
        ) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn get_eap_user_identity(&self, _: &str, _: &mut Option<EapIdentityBuffer>) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn free_eap_user_identity(&self, _: EapIdentityBuffer) {
            self.frees.set(self.frees.get() + 1);
        }
        fn get_credentials(&self, _: &str, _: &mut CallParams) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn get_autodial_param(&self, _: AutodialParam, _: &mut CallParams) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn set_autodial_param(&self, _: AutodialParam, _: &[u8]) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn get_autodial_enable(&self, _: u32, _: &mut bool) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn set_autodial_enable(&self, _: u32, _: bool) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
        fn hang_up(&self, _: RasHandle) -> u32 {
            status::ERROR_INVALID_FUNCTION
        }
    }

    #[test]
    fn test_guard_frees_exactly_once() {
        let api = FreeCounter {
            frees: Cell::new(0),
        };

        {
            let guard = EapIdentityGuard::new(
                &api,
                EapIdentityBuffer {
                    token: 42,
                    bytes: vec![1, 2, 3],
                },
            );
            assert_eq!(guard.bytes(), &[1, 2, 3]);
        }

        assert_eq!(api.frees.get(), 1);
    }

    #[test]
    fn test_null_handle() {
        assert!(RasHandle::NULL.is_null());
        assert!(!RasHandle(7).is_null());
    }

    #[test]
    fn test_projection_levels() {
        use crate::capability::CapabilityLevel;
        assert_eq!(
            ProjectionKind::Ipv4.required_level(),
            CapabilityLevel::Base
        );
        assert_eq!(
            ProjectionKind::Ipv6.required_level(),
            CapabilityLevel::Ipv6Aware
        );
        assert_eq!(
            ProjectionKind::TunnelEndpoints.required_level(),
            CapabilityLevel::TunnelAware
        );
    }
}
