//! Live location sharing server
//!
//! Devices report their position over HTTP. The server keeps only the latest
//! report of each identity, forgets identities that go quiet, and pushes each
//! observer a filtered view of who is live whenever that view changes.
//!
//! ```no_run
//! use geoshare::access::{Credential, PermittedGroups, TokenAuthenticator};
//! use geoshare::{GeoshareServer, ServerConfig};
//!
//! # async fn run() -> geoshare::Result<()> {
//! let auth = TokenAuthenticator::new().with_token(
//!     "family-token",
//!     Credential::new("alice", PermittedGroups::only(["family"])),
//! );
//!
//! let server = GeoshareServer::new(ServerConfig::default(), auth);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```
//!
//! # Modules
//!
//! - [`registry`]: the expiring identity → latest report map
//! - [`access`]: token checks and group visibility
//! - [`session`]: per-observer change detection and the tick loop
//! - [`server`]: HTTP routes, config and the listener
//! - [`stats`]: server counters

pub mod access;
pub mod error;
pub mod logging;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use logging::{init_tracing, LogFormat, LoggingConfig};
pub use registry::{LocationRegistry, LocationReport, RegistryConfig, Snapshot, Timestamp};
pub use server::{GeoshareConfig, GeoshareServer, ServerConfig};
