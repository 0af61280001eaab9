//! rasinterop - Native Interop Marshaling for Remote Access Services
//!
//! This is a **static library** that exposes a remote access (dial-up/VPN)
//! connection service implemented by an operating-system component to
//! higher-level callers.
//!
//! ## What This Library Provides
//! - Buffer negotiation for native calls that report insufficient-buffer
//!   as a retriable status and require a larger allocation
//! - Exclusive ownership of unmanaged memory across the retry loop, with
//!   guaranteed release on every exit path
//! - Decoding of count-prefixed sequences of fixed-size native records
//! - Capability-gated conversion between logical network addresses and
//!   the component's version-specific wire layouts
//! - A caller-facing connection service (enumeration, statistics,
//!   projection info, credentials, autodial configuration)
//! - Configuration parsing and validation (TOML format)
//! - C FFI bindings for integration with other languages
//!
//! ## What Your Application Must Implement
//! - The native entry points themselves (the operating-system component),
//!   supplied either as a [`native::RasNative`] implementation or as a
//!   C vtable through the FFI surface
//! - Connection establishment and any UI prompting around it

pub mod address;
pub mod capability;
pub mod config;
pub mod error;
pub mod marshal;
pub mod native;
pub mod service;

// Re-export core types for static library interface
pub use address::{AddressConverter, AddressLayout, LogicalAddress, NativeAddress};
pub use capability::CapabilityLevel;
pub use config::Config;
pub use error::{RasError, Result};
pub use native::{ProjectionKind, RasHandle, RasNative};
pub use service::{ActiveConnection, ConnectionService, ProjectionInfo};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// C FFI Interface for cross-platform integration
pub mod ffi;
