//! Observer state machine
//!
//! Tracks one stream connection from open to close and decides, per tick,
//! whether the filtered registry state differs from what was last sent.

use crate::access::{filter, PermittedGroups};
use crate::registry::Snapshot;

/// Observer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverPhase {
    /// Connection open, ticking
    Active,
    /// Connection closed by the observer or the transport (terminal)
    Closed,
}

/// Per-connection diffing state
#[derive(Debug)]
pub struct ObserverState {
    /// Current phase
    pub phase: ObserverPhase,

    /// Groups this connection may see
    permitted: PermittedGroups,

    /// Payload most recently handed to the connection
    last_emitted: Option<String>,

    /// Ticks evaluated
    pub ticks: u64,

    /// Payloads emitted
    pub emissions: u64,
}

impl ObserverState {
    /// Create a new observer state
    pub fn new(permitted: PermittedGroups) -> Self {
        Self {
            phase: ObserverPhase::Active,
            permitted,
            last_emitted: None,
            ticks: 0,
            emissions: 0,
        }
    }

    /// Evaluate one tick against `snapshot`
    ///
    /// Returns the serialized filtered state if it differs from the last
    /// emitted payload. The payload only counts as emitted once
    /// [`commit`](Self::commit) is called, so a payload that could not be
    /// delivered is offered again on the next tick. Closed observers never
    /// produce output.
    pub fn on_tick(&mut self, snapshot: &Snapshot) -> Result<Option<String>, serde_json::Error> {
        if self.phase == ObserverPhase::Closed {
            return Ok(None);
        }
        self.ticks += 1;

        let payload = filter(snapshot, &self.permitted).to_json()?;
        if self.last_emitted.as_deref() == Some(payload.as_str()) {
            Ok(None)
        } else {
            Ok(Some(payload))
        }
    }

    /// Record `payload` as delivered
    pub fn commit(&mut self, payload: String) {
        self.last_emitted = Some(payload);
        self.emissions += 1;
    }

    /// Last payload delivered, if any
    pub fn last_emitted(&self) -> Option<&str> {
        self.last_emitted.as_deref()
    }

    /// Check if the observer is active
    pub fn is_active(&self) -> bool {
        self.phase == ObserverPhase::Active
    }

    /// Transition to closed and release the emitted buffer
    pub fn close(&mut self) {
        self.phase = ObserverPhase::Closed;
        self.last_emitted = None;
    }
}
