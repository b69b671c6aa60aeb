//! Server configuration

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::access::{Credential, PermittedGroups, TokenAuthenticator};
use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use crate::registry::RegistryConfig;

/// Server configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent observer streams (0 = unlimited)
    pub max_observers: usize,

    /// Interval between broadcaster evaluations, in milliseconds
    pub tick_interval_ms: u64,

    /// Undelivered updates buffered per observer
    pub stream_buffer: usize,

    /// Interval between SSE keep-alive comments, in seconds
    pub keep_alive_secs: u64,

    /// Require a valid bearer token on location reports and stops
    pub require_report_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            max_observers: 0, // Unlimited
            tick_interval_ms: 1000,
            stream_buffer: 16,
            keep_alive_secs: 15,
            require_report_auth: false,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum observer streams
    pub fn max_observers(mut self, max: usize) -> Self {
        self.max_observers = max;
        self
    }

    /// Set the broadcaster tick interval (whole milliseconds, minimum 1)
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = (interval.as_millis() as u64).max(1);
        self
    }

    /// Set the per-observer buffer
    pub fn stream_buffer(mut self, buffer: usize) -> Self {
        self.stream_buffer = buffer;
        self
    }

    /// Set the SSE keep-alive interval (whole seconds, minimum 1)
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive_secs = interval.as_secs().max(1);
        self
    }

    /// Require bearer tokens on reports
    pub fn require_report_auth(mut self, required: bool) -> Self {
        self.require_report_auth = required;
        self
    }

    /// Broadcaster tick interval
    pub fn tick_interval_duration(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// SSE keep-alive interval
    pub fn keep_alive_duration(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// An observer token entry from the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Bearer token presented by the observer
    pub token: String,

    /// Observer name; also the identity its reports are stored under
    pub name: String,

    /// Groups the observer may see; absent means unrestricted
    #[serde(default)]
    pub groups: Option<Vec<String>>,
}

impl ObserverConfig {
    fn credential(&self) -> Credential {
        let permitted = match &self.groups {
            Some(groups) => PermittedGroups::only(groups.iter().cloned()),
            None => PermittedGroups::Unrestricted,
        };
        Credential::new(self.name.clone(), permitted)
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoshareConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub observers: Vec<ObserverConfig>,
}

impl GeoshareConfig {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json5(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.tick_interval_ms == 0 {
            return Err(Error::config("server.tick_interval_ms must be positive"));
        }
        if self.server.stream_buffer == 0 {
            return Err(Error::config("server.stream_buffer must be positive"));
        }
        if self.server.keep_alive_secs == 0 {
            return Err(Error::config("server.keep_alive_secs must be positive"));
        }
        if self.registry.ttl_secs == 0 {
            return Err(Error::config("registry.ttl_secs must be positive"));
        }

        let mut seen = HashSet::new();
        for (i, observer) in self.observers.iter().enumerate() {
            if observer.token.is_empty() {
                return Err(Error::config(format!("Observer {} has an empty token", i)));
            }
            if observer.name.is_empty() {
                return Err(Error::config(format!("Observer {} has an empty name", i)));
            }
            if !seen.insert(observer.token.as_str()) {
                return Err(Error::config(format!(
                    "Observer {} ({}) reuses another observer's token",
                    i, observer.name
                )));
            }
        }

        Ok(())
    }

    /// Build the token table for the configured observers
    pub fn authenticator(&self) -> TokenAuthenticator {
        let mut auth = TokenAuthenticator::new();
        for observer in &self.observers {
            auth.insert(observer.token.clone(), observer.credential());
        }
        auth
    }
}
