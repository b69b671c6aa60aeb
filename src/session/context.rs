//! Observer context
//!
//! Identity and authorization of one stream connection, fixed when the
//! connection opens.

use std::time::Instant;

use crate::access::{Credential, PermittedGroups};

/// Context of an observer stream
#[derive(Debug, Clone)]
pub struct ObserverContext {
    /// Unique session ID
    pub session_id: u64,

    /// Authenticated observer name
    pub observer: String,

    /// Groups this connection may see, for its whole lifetime
    pub permitted: PermittedGroups,

    /// When the stream was opened
    pub opened_at: Instant,
}

impl ObserverContext {
    /// Create a new context
    pub fn new(session_id: u64, observer: impl Into<String>, permitted: PermittedGroups) -> Self {
        Self {
            session_id,
            observer: observer.into(),
            permitted,
            opened_at: Instant::now(),
        }
    }

    /// Create a context from an accepted credential
    pub fn from_credential(session_id: u64, credential: Credential) -> Self {
        Self::new(session_id, credential.subject, credential.permitted)
    }

    /// Get connection duration
    pub fn duration(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }
}
