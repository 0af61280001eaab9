//! Configuration module for the remote access interop layer
//!
//! This module provides TOML-based configuration parsing and validation
//! for the static library.

use crate::capability::CapabilityLevel;
use crate::error::{RasError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Buffer negotiation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Initial buffer size in bytes for buffered native calls
    #[serde(default = "default_initial_buffer_size")]
    pub initial_buffer_size: usize,
    /// Upper bound on a single negotiated buffer, in bytes
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: default_initial_buffer_size(),
            max_buffer_size: default_max_buffer_size(),
        }
    }
}

/// Native component capability settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilityConfig {
    /// Feature level of the deployed remote access component
    #[serde(default)]
    pub level: CapabilityLevel,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to log to a file
    #[serde(default)]
    pub file_logging: bool,
    /// Path to log file
    pub log_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            log_path: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Buffer negotiation settings
    #[serde(default)]
    pub negotiation: NegotiationConfig,
    /// Native component capability settings
    #[serde(default)]
    pub capability: CapabilityConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| RasError::Config(format!("Failed to read config file: {e}")))?;

        <Self as FromStr>::from_str(&contents)
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RasError::Config(format!("Failed to serialize config: {e}")))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.negotiation.initial_buffer_size == 0 {
            return Err(RasError::Config(
                "Initial buffer size cannot be zero".to_string(),
            ));
        }

        if self.negotiation.max_buffer_size < self.negotiation.initial_buffer_size {
            return Err(RasError::Config(
                "Maximum buffer size cannot be below the initial buffer size".to_string(),
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = RasError;

    fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RasError::Config(format!("Failed to parse TOML: {e}")))
    }
}

// Default value functions for serde
fn default_initial_buffer_size() -> usize {
    64
}

fn default_max_buffer_size() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_parsing() {
        let toml_content = r#"
[negotiation]
initial_buffer_size = 128
max_buffer_size = 65536

[capability]
level = "tunnel_aware"

[logging]
level = "debug"
"#;

        let config = toml_content
            .parse::<Config>()
            .expect("Failed to parse config");
        assert_eq!(config.negotiation.initial_buffer_size, 128);
        assert_eq!(config.negotiation.max_buffer_size, 65536);
        assert_eq!(config.capability.level, CapabilityLevel::TunnelAware);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = "".parse::<Config>().expect("Failed to parse empty config");
        assert_eq!(config.negotiation.initial_buffer_size, 64);
        assert_eq!(config.capability.level, CapabilityLevel::Base);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Zero initial size should fail
        config.negotiation.initial_buffer_size = 0;
        assert!(config.validate().is_err());

        // Cap below the initial size should fail
        config.negotiation.initial_buffer_size = 1024;
        config.negotiation.max_buffer_size = 512;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[capability]\nlevel = \"ipv6_aware\"").expect("write");

        let config = Config::from_file(file.path()).expect("Failed to load config");
        assert_eq!(config.capability.level, CapabilityLevel::Ipv6Aware);
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let toml = config.to_toml().expect("serialize");
        let parsed = toml.parse::<Config>().expect("reparse");
        assert_eq!(
            parsed.negotiation.initial_buffer_size,
            config.negotiation.initial_buffer_size
        );
    }
}
