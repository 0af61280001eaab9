//! C FFI Interface for the rasinterop Static Library
//!
//! This module provides C-compatible functions for integrating the
//! marshaling layer into applications written in other languages
//! (C#, Swift, Kotlin, etc.). The host supplies the native remote access
//! entry points as a vtable of function pointers; the library owns the
//! buffer negotiation and record decoding on top of them.

#![allow(clippy::missing_safety_doc)]

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use crate::marshal::buffer::{CallParams, CountedCallParams};
use crate::native::types::LinkStatistics;
use crate::native::{status, AutodialParam, EapIdentityBuffer, ProjectionKind, RasHandle, RasNative};
use crate::service::ConnectionService;
use crate::{Config, RasError};

/// Error codes returned by C FFI functions
#[repr(C)]
pub enum RasInteropError {
    Success = 0,
    InvalidConfig = 1,
    NativeCallFailed = 2,
    NegotiationExhausted = 3,
    CorruptBuffer = 4,
    InvalidParameter = 5,
    UnsupportedCapability = 6,
    BufferTooSmall = 7,
    InternalError = 99,
}

impl From<&RasError> for RasInteropError {
    fn from(error: &RasError) -> Self {
        match error {
            RasError::Config(_) => RasInteropError::InvalidConfig,
            RasError::NativeCall { .. } => RasInteropError::NativeCallFailed,
            RasError::NegotiationExhausted { .. } => RasInteropError::NegotiationExhausted,
            RasError::CorruptBuffer(_) => RasInteropError::CorruptBuffer,
            RasError::InvalidParameter(_) => RasInteropError::InvalidParameter,
            RasError::UnsupportedCapability(_) => RasInteropError::UnsupportedCapability,
            _ => RasInteropError::InternalError,
        }
    }
}

/// Counted enumeration entry point supplied by the host
pub type EnumConnectionsFn =
    unsafe extern "C" fn(ctx: *mut c_void, buffer: *mut u8, size: *mut usize, count: *mut u32) -> u32;

/// Buffered per-handle entry point supplied by the host
pub type BufferCallFn =
    unsafe extern "C" fn(ctx: *mut c_void, handle: u64, buffer: *mut u8, size: *mut usize) -> u32;

/// Projection entry point supplied by the host
pub type ProjectionFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    handle: u64,
    kind: u32,
    buffer: *mut u8,
    size: *mut usize,
) -> u32;

/// One-shot per-handle entry point supplied by the host
pub type HangUpFn = unsafe extern "C" fn(ctx: *mut c_void, handle: u64) -> u32;

/// Native entry points supplied by the host application.
///
/// A null entry is reported as status 1 (invalid function) when invoked.
#[repr(C)]
pub struct RasNativeVtable {
    pub enum_connections: Option<EnumConnectionsFn>,
    pub get_connection_statistics: Option<BufferCallFn>,
    pub get_projection_info: Option<ProjectionFn>,
    pub hang_up: Option<HangUpFn>,
}

/// Contract implementation that forwards to the host vtable
struct FfiNative {
    ctx: *mut c_void,
    vtable: RasNativeVtable,
}

impl RasNative for FfiNative {
    fn enum_connections(&self, params: &mut CountedCallParams) -> u32 {
        let Some(f) = self.vtable.enum_connections else {
            return status::ERROR_INVALID_FUNCTION;
        };

        let mut size = params.size();
        let mut count = 0u32;
        let code = unsafe { f(self.ctx, params.address(), &mut size, &mut count) };
        params.set_size(size);
        if code == status::SUCCESS {
            params.set_count(count);
        }
        code
    }

    fn get_connection_statistics(&self, handle: RasHandle, params: &mut CallParams) -> u32 {
        let Some(f) = self.vtable.get_connection_statistics else {
            return status::ERROR_INVALID_FUNCTION;
        };

        let mut size = params.size();
        let code = unsafe { f(self.ctx, handle.0, params.address(), &mut size) };
        params.set_size(size);
        code
    }

    fn get_projection_info(
        &self,
        handle: RasHandle,
        kind: ProjectionKind,
        params: &mut CallParams,
    ) -> u32 {
        let Some(f) = self.vtable.get_projection_info else {
            return status::ERROR_INVALID_FUNCTION;
        };

        let mut size = params.size();
        let code = unsafe { f(self.ctx, handle.0, kind.as_u32(), params.address(), &mut size) };
        params.set_size(size);
        code
    }

    fn get_eap_user_identity(&self, _entry_name: &str, _out: &mut Option<EapIdentityBuffer>) -> u32 {
        status::ERROR_INVALID_FUNCTION
    }

    fn free_eap_user_identity(&self, _buffer: EapIdentityBuffer) {}

    fn get_credentials(&self, _entry_name: &str, _params: &mut CallParams) -> u32 {
        status::ERROR_INVALID_FUNCTION
    }

    fn get_autodial_param(&self, _param: AutodialParam, _params: &mut CallParams) -> u32 {
        status::ERROR_INVALID_FUNCTION
    }

    fn set_autodial_param(&self, _param: AutodialParam, _value: &[u8]) -> u32 {
        status::ERROR_INVALID_FUNCTION
    }

    fn get_autodial_enable(&self, _dialing_location: u32, _enabled: &mut bool) -> u32 {
        status::ERROR_INVALID_FUNCTION
    }

    fn set_autodial_enable(&self, _dialing_location: u32, _enabled: bool) -> u32 {
        status::ERROR_INVALID_FUNCTION
    }

    fn hang_up(&self, handle: RasHandle) -> u32 {
        let Some(f) = self.vtable.hang_up else {
            return status::ERROR_INVALID_FUNCTION;
        };
        unsafe { f(self.ctx, handle.0) }
    }
}

/// Opaque service handle for C callers
pub struct RasService {
    inner: ConnectionService<FfiNative>,
}

/// One connection as surfaced across the C boundary
#[repr(C)]
pub struct RasConnectionInfo {
    pub handle: u64,
    pub device_kind: u32,
    pub entry_name: [c_char; 64],
    pub device_name: [c_char; 64],
}

/// Link statistics as surfaced across the C boundary
#[repr(C)]
pub struct RasLinkStatistics {
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

impl From<LinkStatistics> for RasLinkStatistics {
    fn from(stats: LinkStatistics) -> Self {
        Self {
            bytes_transmitted: stats.bytes_transmitted,
            bytes_received: stats.bytes_received,
            frames_transmitted: stats.frames_transmitted,
            frames_received: stats.frames_received,
            crc_errors: stats.crc_errors,
            timeout_errors: stats.timeout_errors,
            alignment_errors: stats.alignment_errors,
            hardware_overrun_errors: stats.hardware_overrun_errors,
            framing_errors: stats.framing_errors,
            buffer_overrun_errors: stats.buffer_overrun_errors,
            compression_ratio_in: stats.compression_ratio_in,
            compression_ratio_out: stats.compression_ratio_out,
            link_speed_bps: stats.link_speed_bps,
            connect_duration_ms: stats.connect_duration_ms,
        }
    }
}

/// Copy a string into a fixed C char array, truncating and always
/// NUL-terminating
fn copy_str_to_c(dest: &mut [c_char], value: &str) {
    let bytes = value.as_bytes();
    let copy_len = std::cmp::min(bytes.len(), dest.len() - 1);
    for (i, &b) in bytes[..copy_len].iter().enumerate() {
        dest[i] = b as c_char;
    }
    dest[copy_len] = 0;
}

/// Parse and validate a TOML configuration string
///
/// # Parameters
/// - `config_str`: TOML configuration string
/// - `error_msg`: Output buffer for error messages (nullable)
/// - `error_msg_len`: Size of error message buffer
///
/// # Returns
/// - 0 on success
/// - Error code on failure
#[no_mangle]
pub unsafe extern "C" fn rasinterop_parse_config(
    config_str: *const c_char,
    error_msg: *mut c_char,
    error_msg_len: usize,
) -> c_int {
    if config_str.is_null() {
        return RasInteropError::InvalidParameter as c_int;
    }

    let config_str = match CStr::from_ptr(config_str).to_str() {
        Ok(s) => s,
        Err(_) => return RasInteropError::InvalidParameter as c_int,
    };

    let parsed = config_str
        .parse::<Config>()
        .and_then(|config| config.validate().map(|()| config));

    match parsed {
        Ok(_) => RasInteropError::Success as c_int,
        Err(err) => {
            if !error_msg.is_null() && error_msg_len > 0 {
                let error_str = format!("{err}");
                let error_bytes = error_str.as_bytes();
                let copy_len = std::cmp::min(error_bytes.len(), error_msg_len - 1);

                ptr::copy_nonoverlapping(
                    error_bytes.as_ptr() as *const c_char,
                    error_msg,
                    copy_len,
                );
                *error_msg.add(copy_len) = 0; // Null terminate
            }
            RasInteropError::from(&err) as c_int
        }
    }
}

/// Create a new connection service over host-supplied native entry points
///
/// # Parameters
/// - `config_str`: TOML configuration string (nullable for defaults)
/// - `vtable`: Native entry points; copied, may go out of scope after the call
/// - `ctx`: Opaque host context passed to every entry point
///
/// # Returns
/// - Opaque pointer to the service on success
/// - NULL on failure
#[no_mangle]
pub unsafe extern "C" fn rasinterop_service_new(
    config_str: *const c_char,
    vtable: *const RasNativeVtable,
    ctx: *mut c_void,
) -> *mut RasService {
    if vtable.is_null() {
        return ptr::null_mut();
    }

    let config = if config_str.is_null() {
        Config::default()
    } else {
        let config_str = match CStr::from_ptr(config_str).to_str() {
            Ok(s) => s,
            Err(_) => return ptr::null_mut(),
        };
        match config_str.parse::<Config>() {
            Ok(config) => config,
            Err(_) => return ptr::null_mut(),
        }
    };

    let native = FfiNative {
        ctx,
        vtable: ptr::read(vtable),
    };

    match ConnectionService::new(native, &config) {
        Ok(inner) => Box::into_raw(Box::new(RasService { inner })),
        Err(_) => ptr::null_mut(),
    }
}

/// Enumerate active connections into a caller-provided array
///
/// # Parameters
/// - `service`: Service instance from `rasinterop_service_new`
/// - `out`: Destination array (may be null when `capacity` is 0)
/// - `capacity`: Number of entries `out` can hold
/// - `count_out`: Receives the number of active connections
///
/// # Returns
/// - 0 on success
/// - `BufferTooSmall` when `capacity` is insufficient; `count_out` holds
///   the required entry count
/// - Error code on failure
#[no_mangle]
pub unsafe extern "C" fn rasinterop_active_connections(
    service: *const RasService,
    out: *mut RasConnectionInfo,
    capacity: usize,
    count_out: *mut usize,
) -> c_int {
    if service.is_null() || count_out.is_null() {
        return RasInteropError::InvalidParameter as c_int;
    }
    if out.is_null() && capacity > 0 {
        return RasInteropError::InvalidParameter as c_int;
    }

    let service = &*service;
    let connections = match service.inner.active_connections() {
        Ok(connections) => connections,
        Err(err) => return RasInteropError::from(&err) as c_int,
    };

    *count_out = connections.len();
    if connections.len() > capacity {
        return RasInteropError::BufferTooSmall as c_int;
    }

    for (i, connection) in connections.iter().enumerate() {
        let entry = &mut *out.add(i);
        entry.handle = connection.handle.0;
        entry.device_kind = connection.device_kind as u32;
        copy_str_to_c(&mut entry.entry_name, &connection.entry_name);
        copy_str_to_c(&mut entry.device_name, &connection.device_name);
    }

    RasInteropError::Success as c_int
}

/// Retrieve link statistics for a connection
///
/// # Parameters
/// - `service`: Service instance
/// - `handle`: Connection handle from enumeration
/// - `out`: Destination statistics structure
///
/// # Returns
/// - 0 on success
/// - Error code on failure
#[no_mangle]
pub unsafe extern "C" fn rasinterop_link_statistics(
    service: *const RasService,
    handle: u64,
    out: *mut RasLinkStatistics,
) -> c_int {
    if service.is_null() || out.is_null() {
        return RasInteropError::InvalidParameter as c_int;
    }

    let service = &*service;
    match service.inner.link_statistics(RasHandle(handle)) {
        Ok(stats) => {
            *out = RasLinkStatistics::from(stats);
            RasInteropError::Success as c_int
        }
        Err(err) => RasInteropError::from(&err) as c_int,
    }
}

/// Terminate a connection
///
/// # Parameters
/// - `service`: Service instance
/// - `handle`: Connection handle from enumeration
///
/// # Returns
/// - 0 on success
/// - Error code on failure
#[no_mangle]
pub unsafe extern "C" fn rasinterop_hang_up(service: *const RasService, handle: u64) -> c_int {
    if service.is_null() {
        return RasInteropError::InvalidParameter as c_int;
    }

    let service = &*service;
    match service.inner.hang_up(RasHandle(handle)) {
        Ok(()) => RasInteropError::Success as c_int,
        Err(err) => RasInteropError::from(&err) as c_int,
    }
}

/// Free a service instance
///
/// # Parameters
/// - `service`: Service instance to free
#[no_mangle]
pub unsafe extern "C" fn rasinterop_service_free(service: *mut RasService) {
    if !service.is_null() {
        unsafe {
            let _ = Box::from_raw(service);
        }
    }
}

/// Get library version
///
/// # Returns
/// - Version string (caller must not free)
#[no_mangle]
pub unsafe extern "C" fn rasinterop_version() -> *const c_char {
    static VERSION_CSTR: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION_CSTR.as_ptr() as *const c_char
}
