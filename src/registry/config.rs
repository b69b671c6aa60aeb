//! Registry configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time-to-live for a device record, in seconds
pub const DEFAULT_TTL_SECS: u64 = 30;

/// Location registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Seconds after the last report before a device is evicted
    pub ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

impl RegistryConfig {
    /// Set the record time-to-live
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    /// Record time-to-live as a duration
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
