//! Device record types
//!
//! This module defines the per-device state stored in the registry and the
//! report that produces it.

use std::collections::BTreeSet;

use serde::Serialize;

use super::clock::Timestamp;

/// Reported coordinates
///
/// Either coordinate may be missing. Partial reports are stored as-is and
/// observers are expected to cope with the gaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "lon")]
    pub longitude: Option<f64>,
}

impl Position {
    /// Create a position with both coordinates
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Check if both coordinates are present
    pub fn is_complete(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// A single location report, as accepted from a device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationReport {
    /// Device or user identity
    pub identity: String,
    /// Reported coordinates
    pub position: Position,
    /// Optional bearing in degrees
    pub heading: Option<f64>,
    /// Groups the record is visible to
    pub groups: BTreeSet<String>,
}

impl LocationReport {
    /// Create a report with no position
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// Set the position
    pub fn position(mut self, latitude: f64, longitude: f64) -> Self {
        self.position = Position::new(latitude, longitude);
        self
    }

    /// Set the heading
    pub fn heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Set the visibility groups
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Latest known state of one identity
///
/// Serialized field order is fixed so equal records always produce equal
/// bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    #[serde(rename = "id")]
    pub identity: String,

    #[serde(flatten)]
    pub position: Position,

    pub heading: Option<f64>,

    /// Empty means visible to unrestricted observers only
    pub groups: BTreeSet<String>,

    /// Receipt time of the latest report; drives expiry
    #[serde(rename = "timestamp")]
    pub last_seen: Timestamp,
}

impl DeviceRecord {
    /// Build a record from a report received at `last_seen`
    pub fn from_report(report: LocationReport, last_seen: Timestamp) -> Self {
        Self {
            identity: report.identity,
            position: report.position,
            heading: report.heading,
            groups: report.groups,
            last_seen,
        }
    }

    /// Check if any of the record's groups is in `groups`
    pub fn shares_group(&self, groups: &BTreeSet<String>) -> bool {
        !self.groups.is_disjoint(groups)
    }
}
