//! HTTP server
//!
//! - [`config`]: bind address, observer limit, tick and keep-alive settings
//! - [`ingest`]: report and stop request bodies
//! - [`routes`]: the axum router and shared handler state
//! - [`listener`]: binds the socket and serves until shutdown

pub mod config;
pub mod ingest;
pub mod listener;
pub mod routes;

pub use config::{GeoshareConfig, ObserverConfig, ServerConfig};
pub use ingest::ReportBody;
pub use listener::GeoshareServer;
pub use routes::{build_router, AppState};
