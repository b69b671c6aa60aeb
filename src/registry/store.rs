//! Location registry implementation
//!
//! The central registry that holds the latest record of every reporting
//! identity and evicts records that have outlived the TTL.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use super::clock::Timestamp;
use super::config::RegistryConfig;
use super::entry::{DeviceRecord, LocationReport};
use super::snapshot::Snapshot;

/// Central registry for all live device records
///
/// Every public operation holds the single lock for its whole duration and
/// sweeps expired records first, so no caller can observe a record older than
/// the TTL and a sweep can never interleave with a write.
pub struct LocationRegistry {
    /// Map of identity to latest record
    devices: Mutex<HashMap<String, DeviceRecord>>,

    /// Configuration
    config: RegistryConfig,
}

impl LocationRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Insert or fully replace the record for `report.identity`
    ///
    /// `timestamp` becomes the record's `last_seen` even if it is older than
    /// the stored one. Expired records are swept against `timestamp` first, so
    /// an identity whose previous record has expired starts from scratch.
    pub fn upsert(&self, report: LocationReport, timestamp: Timestamp) {
        let mut devices = self.devices.lock();
        sweep(&mut devices, timestamp, self.config.ttl_duration());

        let record = DeviceRecord::from_report(report, timestamp);
        let identity = record.identity.clone();
        let groups = record.groups.len();

        if devices.insert(identity.clone(), record).is_some() {
            tracing::debug!(identity = %identity, groups, "Device updated");
        } else {
            tracing::info!(
                identity = %identity,
                groups,
                devices = devices.len(),
                "Device registered"
            );
        }
    }

    /// Remove the record for `identity`
    ///
    /// Returns whether a live record was removed. Removing an unknown or
    /// already expired identity is a no-op.
    pub fn remove(&self, identity: &str, now: Timestamp) -> bool {
        let mut devices = self.devices.lock();
        sweep(&mut devices, now, self.config.ttl_duration());

        let removed = devices.remove(identity).is_some();
        if removed {
            tracing::info!(identity = %identity, "Device stopped sharing");
        }
        removed
    }

    /// Take a snapshot of all records live at `now`
    ///
    /// Expired records are removed from the store, not just hidden from the
    /// returned snapshot.
    pub fn snapshot(&self, now: Timestamp) -> Snapshot {
        let mut devices = self.devices.lock();
        sweep(&mut devices, now, self.config.ttl_duration());

        Snapshot::new(now, devices.values().cloned())
    }

    /// Number of records live at `now`
    pub fn live_count(&self, now: Timestamp) -> usize {
        let mut devices = self.devices.lock();
        sweep(&mut devices, now, self.config.ttl_duration());
        devices.len()
    }
}

impl Default for LocationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove every record with `now - last_seen > ttl`
fn sweep(devices: &mut HashMap<String, DeviceRecord>, now: Timestamp, ttl: Duration) {
    let before = devices.len();

    devices.retain(|identity, record| {
        let live = now.saturating_since(record.last_seen) <= ttl;
        if !live {
            tracing::info!(
                identity = %identity,
                last_seen = %record.last_seen,
                "Device expired"
            );
        }
        live
    });

    let evicted = before - devices.len();
    if evicted > 0 {
        tracing::debug!(evicted, remaining = devices.len(), "Expired devices swept");
    }
}
