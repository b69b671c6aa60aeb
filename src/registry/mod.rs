//! Ephemeral location registry
//!
//! The registry holds the latest report of every identity and forgets it once
//! the identity has been silent for longer than the TTL.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<LocationRegistry>
//!                   ┌──────────────────────────┐
//!                   │ devices: Mutex<HashMap<  │
//!                   │   identity,              │
//!                   │   DeviceRecord {         │
//!                   │     position, heading,   │
//!                   │     groups, last_seen,   │
//!                   │   }                      │
//!                   │ >>                       │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [POST /location]       [Broadcaster]           [Broadcaster]
//!   upsert(report, now)    snapshot(now)           snapshot(now)
//!                               │                       │
//!                               └──► filter ──► diff ──► SSE
//! ```
//!
//! # Expiry
//!
//! There is no background sweeper. Every `upsert`, `remove` and `snapshot`
//! evicts expired records under the same lock before doing its work, so
//! staleness depends only on the time passed in, never on task scheduling.

pub mod clock;
pub mod config;
pub mod entry;
pub mod snapshot;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::RegistryConfig;
pub use entry::{DeviceRecord, LocationReport, Position};
pub use snapshot::Snapshot;
pub use store::LocationRegistry;
