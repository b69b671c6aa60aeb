//! Location server listener
//!
//! Binds the TCP socket and serves the router until shut down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::access::Authenticator;
use crate::error::Result;
use crate::registry::{Clock, LocationRegistry, RegistryConfig};
use crate::server::config::ServerConfig;
use crate::server::routes::{build_router, AppState};
use crate::stats::ServerStats;

/// Location sharing server
pub struct GeoshareServer<A: Authenticator> {
    state: Arc<AppState<A>>,
}

impl<A: Authenticator> GeoshareServer<A> {
    /// Create a new server with the given configuration and authenticator
    pub fn new(config: ServerConfig, authenticator: A) -> Self {
        Self::with_registry_config(config, authenticator, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        authenticator: A,
        registry_config: RegistryConfig,
    ) -> Self {
        Self {
            state: Arc::new(AppState::new(config, authenticator, registry_config)),
        }
    }

    /// Create a server reading time from `clock`
    pub fn with_clock(
        config: ServerConfig,
        authenticator: A,
        registry_config: RegistryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Arc::new(AppState::with_clock(
                config,
                authenticator,
                registry_config,
                clock,
            )),
        }
    }

    /// Get a reference to the location registry
    pub fn registry(&self) -> &Arc<LocationRegistry> {
        &self.state.registry
    }

    /// Current server counters
    pub fn stats(&self) -> ServerStats {
        self.state.stats()
    }

    /// Router serving this server's state
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.state.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind_addr()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Open change streams are closed when the signal fires so that in-flight
    /// connections can drain.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            ttl_secs = self.state.registry.config().ttl_secs,
            tick_ms = self.state.config.tick_interval_ms,
            max_observers = self.state.config.max_observers,
            "Location server listening"
        );

        let broadcaster = self.state.broadcaster.clone();
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            broadcaster.shutdown();
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!(addr = %addr, "Location server stopped");
        Ok(())
    }
}
