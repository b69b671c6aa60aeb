//! Observer authorization
//!
//! - [`auth`]: the pluggable credential check run once per request or stream
//! - [`groups`]: the permitted group set and the pure visibility filter

pub mod auth;
pub mod groups;

pub use auth::{AuthResult, Authenticator, Credential, TokenAuthenticator};
pub use groups::{filter, PermittedGroups};
