//! Observer sessions
//!
//! One session per open change-stream connection: its fixed authorization
//! context, its diffing state, and the task that drives it.

pub mod broadcaster;
pub mod context;
pub mod state;

pub use broadcaster::{Broadcaster, ObserverStream};
pub use context::ObserverContext;
pub use state::{ObserverPhase, ObserverState};
