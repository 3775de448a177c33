//! Manager configuration and validation.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::manager::ServiceManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Whether non-streaming queries addressed to an absent service are
    /// answered from a transient instance in its initial state.
    ///
    /// The default preserves the historical asymmetry with the streaming
    /// query path, which always fails with `UnknownService` on an absent id.
    /// Set to `false` to make both paths fail identically.
    #[serde(default = "default_transient_queries")]
    pub transient_queries: bool,

    /// Maximum accepted size of an inbound request envelope in bytes.
    /// Larger envelopes are rejected as malformed before decoding.
    #[serde(default = "default_max_envelope_bytes")]
    pub max_envelope_bytes: usize,
}

fn default_transient_queries() -> bool {
    true
}

fn default_max_envelope_bytes() -> usize {
    4 * 1024 * 1024
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            transient_queries: default_transient_queries(),
            max_envelope_bytes: default_max_envelope_bytes(),
        }
    }
}

impl ManagerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_envelope_bytes == 0 {
            anyhow::bail!("max_envelope_bytes must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ManagerConfig::default();
        assert!(config.transient_queries);
        assert_eq!(config.max_envelope_bytes, 4 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_envelope_limit_rejected() {
        let config = ManagerConfig {
            transient_queries: true,
            max_envelope_bytes: 0,
        };
        assert!(config.validate().is_err());
    }
}
