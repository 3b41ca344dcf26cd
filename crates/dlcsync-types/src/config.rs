//! Runtime configuration with sensible defaults.
//!
//! All operational parameters are centralized here. Every value has a
//! documented default.

use serde::{Deserialize, Serialize};

use crate::{DlcSyncError, Result};

/// dlcsync runtime configuration.
///
/// Shared between the storage engine (durability policy) and the node
/// service (channel sizing).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Capacity of the bounded transport-event channel feeding the
    /// event loop. Transport adapters await backpressure when the loop
    /// falls behind.
    pub event_channel_capacity: usize,

    /// Flush sled to disk after every committed write batch.
    ///
    /// The log and cursor sit on the hot path of resuming a financial
    /// negotiation after reconnect; the default trades write latency
    /// for durability. Disable only when the caller batches its own
    /// flushes.
    pub flush_on_write: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 256,
            flush_on_write: true,
        }
    }
}

impl SyncConfig {
    /// Validates all configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(DlcSyncError::Config {
                reason: "event_channel_capacity must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_values() {
        let config = SyncConfig::default();
        assert_eq!(config.event_channel_capacity, 256);
        assert!(config.flush_on_write);
    }

    #[test]
    fn zero_channel_capacity_rejected() {
        let config = SyncConfig {
            event_channel_capacity: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn flush_disabled_is_valid() {
        let config = SyncConfig {
            flush_on_write: false,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_serde_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config = SyncConfig::default();
        let json = serde_json::to_string(&config)?;
        let parsed: SyncConfig = serde_json::from_str(&json)?;
        assert_eq!(config.event_channel_capacity, parsed.event_channel_capacity);
        assert_eq!(config.flush_on_write, parsed.flush_on_write);
        Ok(())
    }
}
