//! Error types and handling for the remote access interop layer

use thiserror::Error;

/// Main error type for remote access interop operations
#[derive(Error, Debug)]
pub enum RasError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A native entry point returned a nonzero status code.
    ///
    /// The code is preserved exactly as the operating-system component
    /// reported it and is never reinterpreted by this layer.
    #[error("Native call {operation} failed with status {code}")]
    NativeCall {
        operation: &'static str,
        code: u32,
    },

    /// Buffer negotiation gave up after the bounded number of attempts
    #[error("Buffer negotiation for {operation} exhausted after {attempts} attempts")]
    NegotiationExhausted {
        operation: &'static str,
        attempts: u32,
    },

    /// The native layer produced a buffer inconsistent with its own
    /// reported element count or record layout
    #[error("Corrupt native buffer: {0}")]
    CorruptBuffer(String),

    /// A record layout or projection was requested above the active
    /// capability level
    #[error("Unsupported at this capability level: {0}")]
    UnsupportedCapability(String),

    /// Invalid parameter errors
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unmanaged memory allocation errors
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}

impl RasError {
    /// The native status code carried by this error, if any
    pub fn native_code(&self) -> Option<u32> {
        match self {
            RasError::NativeCall { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for remote access interop operations
pub type Result<T> = std::result::Result<T, RasError>;

/// Helper trait for converting foreign errors to `RasError`
pub trait IntoRasError<T> {
    fn into_ras_error(self, context: &str) -> Result<T>;
}

impl<T, E> IntoRasError<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn into_ras_error(self, context: &str) -> Result<T> {
        self.map_err(|e| RasError::Other(format!("{context}: {e}")))
    }
}

impl From<toml::de::Error> for RasError {
    fn from(err: toml::de::Error) -> Self {
        RasError::Config(format!("TOML parsing error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RasError::NativeCall {
            operation: "RasEnumConnections",
            code: 668,
        };
        assert_eq!(
            err.to_string(),
            "Native call RasEnumConnections failed with status 668"
        );
    }

    #[test]
    fn test_native_code_accessor() {
        let err = RasError::NativeCall {
            operation: "RasGetConnectionStatistics",
            code: 6,
        };
        assert_eq!(err.native_code(), Some(6));
        assert_eq!(RasError::Config("x".to_string()).native_code(), None);
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let ras_err: RasError = io_err.into();
        assert!(matches!(ras_err, RasError::Io(_)));
    }

    #[test]
    fn test_into_ras_error_trait() {
        let result: std::result::Result<(), &str> = Err("test error");
        let ras_result = result.into_ras_error("test context");
        assert!(ras_result.is_err());
        assert!(ras_result.unwrap_err().to_string().contains("test context"));
    }
}
