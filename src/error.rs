//! Error types
//!
//! Registry operations never fail. Errors come from malformed reports,
//! rejected credentials, the observer limit, and startup (config, bind).

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the location server
#[derive(Error, Debug)]
pub enum Error {
    /// Report or stop request is malformed (missing identity, bad JSON)
    #[error("{0}")]
    Validation(String),

    /// Credential missing or rejected
    #[error("{0}")]
    Unauthorized(String),

    /// Observer limit reached
    #[error("Observer limit reached ({0} streams open)")]
    CapacityExceeded(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an authorization error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for Error {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}
