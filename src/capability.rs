//! Capability-level descriptor for the running operating-system component
//!
//! The native remote access component grew its record layouts over several
//! OS feature levels. Which layouts are available is a deployment-time fact
//! supplied by the host, not a compile-time conditional; the converter and
//! the connection service consult the level at construction.

use serde::{Deserialize, Serialize};

/// Feature level of the native remote access component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityLevel {
    /// Baseline component: legacy IPv4-only address records
    #[default]
    Base,
    /// Component with IPv6 address records
    Ipv6Aware,
    /// Component with tagged dual-family tunnel endpoint records
    TunnelAware,
}

impl CapabilityLevel {
    /// True when this level provides at least the features of `required`
    pub fn supports(self, required: CapabilityLevel) -> bool {
        self >= required
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Ipv6Aware => "ipv6_aware",
            Self::TunnelAware => "tunnel_aware",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(CapabilityLevel::TunnelAware.supports(CapabilityLevel::Base));
        assert!(CapabilityLevel::TunnelAware.supports(CapabilityLevel::Ipv6Aware));
        assert!(CapabilityLevel::Ipv6Aware.supports(CapabilityLevel::Base));
        assert!(!CapabilityLevel::Base.supports(CapabilityLevel::Ipv6Aware));
        assert!(!CapabilityLevel::Ipv6Aware.supports(CapabilityLevel::TunnelAware));
    }

    #[test]
    fn test_default_is_base() {
        assert_eq!(CapabilityLevel::default(), CapabilityLevel::Base);
    }
}
