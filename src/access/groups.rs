//! Group-based visibility
//!
//! An observer either sees everything or only records that share at least one
//! group with its permitted set.

use std::collections::BTreeSet;

use crate::registry::{DeviceRecord, Snapshot};

/// Groups an observer connection may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermittedGroups {
    /// Sees every record, including those with no groups
    Unrestricted,
    /// Sees records sharing at least one of these groups
    Only(BTreeSet<String>),
}

impl PermittedGroups {
    /// Restrict to the given groups
    pub fn only<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(groups.into_iter().map(Into::into).collect())
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    /// Check if `record` is visible under this set
    pub fn permits(&self, record: &DeviceRecord) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Only(groups) => record.shares_group(groups),
        }
    }

    /// Intersect with groups requested by the observer
    ///
    /// An empty request leaves the set unchanged. The result never grants more
    /// than `self`.
    pub fn narrow(self, requested: &BTreeSet<String>) -> Self {
        if requested.is_empty() {
            return self;
        }

        match self {
            Self::Unrestricted => Self::Only(requested.clone()),
            Self::Only(groups) => Self::Only(groups.intersection(requested).cloned().collect()),
        }
    }
}

impl std::fmt::Display for PermittedGroups {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unrestricted => write!(f, "*"),
            Self::Only(groups) => {
                let names: Vec<&str> = groups.iter().map(String::as_str).collect();
                write!(f, "[{}]", names.join(","))
            }
        }
    }
}

/// Narrow `snapshot` to the records visible under `permitted`
pub fn filter(snapshot: &Snapshot, permitted: &PermittedGroups) -> Snapshot {
    match permitted {
        PermittedGroups::Unrestricted => snapshot.clone(),
        PermittedGroups::Only(_) => snapshot.retain_where(|record| permitted.permits(record)),
    }
}
