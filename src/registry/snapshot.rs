//! Immutable registry snapshots
//!
//! Records are keyed in a `BTreeMap`, so iteration and serialization order
//! depend only on the identities present, never on insertion history.

use std::collections::BTreeMap;

use super::clock::Timestamp;
use super::entry::DeviceRecord;

/// Copy of all live records at a point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    taken_at: Timestamp,
    records: BTreeMap<String, DeviceRecord>,
}

impl Snapshot {
    /// Build a snapshot from records taken at `taken_at`
    pub fn new<I>(taken_at: Timestamp, records: I) -> Self
    where
        I: IntoIterator<Item = DeviceRecord>,
    {
        Self {
            taken_at,
            records: records
                .into_iter()
                .map(|record| (record.identity.clone(), record))
                .collect(),
        }
    }

    /// Time the snapshot was taken
    pub fn taken_at(&self) -> Timestamp {
        self.taken_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.records.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&DeviceRecord> {
        self.records.get(identity)
    }

    /// Records in identity order
    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.values()
    }

    /// Identities in sorted order
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Keep only the records matching `predicate`
    pub fn retain_where<F>(&self, mut predicate: F) -> Snapshot
    where
        F: FnMut(&DeviceRecord) -> bool,
    {
        Snapshot {
            taken_at: self.taken_at,
            records: self
                .records
                .iter()
                .filter(|(_, record)| predicate(record))
                .map(|(identity, record)| (identity.clone(), record.clone()))
                .collect(),
        }
    }

    /// Serialize as a JSON object mapping identity to record
    ///
    /// Semantically identical snapshots produce byte-identical output.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.records)
    }
}
