//! HTTP surface
//!
//! | Route                 | Purpose                                        |
//! |-----------------------|------------------------------------------------|
//! | `POST /location`      | store a device's latest report                 |
//! | `POST /location/stop` | remove a device immediately                    |
//! | `GET /stream`         | SSE change stream of the observer's view       |
//! | `GET /stats`          | server counters                                |
//! | `GET /health`         | liveness                                       |
//!
//! Reports and stops answer `{"status":"OK"}` or
//! `{"status":"ERROR","message":...}`.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::access::{AuthResult, Authenticator, Credential};
use crate::error::{Error, Result};
use crate::registry::{Clock, LocationRegistry, RegistryConfig, SystemClock};
use crate::session::{Broadcaster, ObserverContext};
use crate::stats::{ServerMetrics, ServerStats};

use super::config::ServerConfig;
use super::ingest::ReportBody;

/// Shared state behind every handler
pub struct AppState<A: Authenticator> {
    pub config: ServerConfig,
    pub registry: Arc<LocationRegistry>,
    pub clock: Arc<dyn Clock>,
    pub authenticator: A,
    pub broadcaster: Broadcaster,
    pub metrics: Arc<ServerMetrics>,
    observer_slots: Option<Arc<Semaphore>>,
    next_session_id: AtomicU64,
}

impl<A: Authenticator> AppState<A> {
    /// Build state reading time from the system clock
    pub fn new(config: ServerConfig, authenticator: A, registry_config: RegistryConfig) -> Self {
        Self::with_clock(config, authenticator, registry_config, Arc::new(SystemClock))
    }

    /// Build state reading time from `clock`
    pub fn with_clock(
        config: ServerConfig,
        authenticator: A,
        registry_config: RegistryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(LocationRegistry::with_config(registry_config));
        let metrics = Arc::new(ServerMetrics::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&clock))
            .tick_interval(config.tick_interval_duration())
            .buffer(config.stream_buffer)
            .metrics(Arc::clone(&metrics));

        let observer_slots = if config.max_observers > 0 {
            Some(Arc::new(Semaphore::new(config.max_observers)))
        } else {
            None
        };

        Self {
            config,
            registry,
            clock,
            authenticator,
            broadcaster,
            metrics,
            observer_slots,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Current server counters
    pub fn stats(&self) -> ServerStats {
        let live = self.registry.live_count(self.clock.now());
        self.metrics.snapshot(live)
    }

    /// Authenticate an optional bearer token on a report or stop
    async fn report_credential(&self, headers: &HeaderMap) -> Result<Option<Credential>> {
        match bearer_token(headers) {
            Some(token) => match self.authenticator.authenticate(token).await {
                AuthResult::Accept(credential) => Ok(Some(credential)),
                AuthResult::Reject(reason) => Err(Error::unauthorized(reason)),
            },
            None if self.config.require_report_auth => Err(Error::unauthorized("Missing token")),
            None => Ok(None),
        }
    }
}

/// Build the router over `state`
pub fn build_router<A: Authenticator>(state: Arc<AppState<A>>) -> Router {
    Router::new()
        .route("/location", post(receive_location::<A>))
        .route("/location/stop", post(stop_sharing::<A>))
        .route("/stream", get(open_stream::<A>))
        .route("/stats", get(stats::<A>))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Reply body for reports and stops
#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl StatusBody {
    fn ok() -> Self {
        Self {
            status: "OK",
            message: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: "ERROR",
            message: Some(message),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::CapacityExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(StatusBody::error(self.to_string()))).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn receive_location<A: Authenticator>(
    State(state): State<Arc<AppState<A>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StatusBody>> {
    let result = async {
        let credential = state.report_credential(&headers).await?;
        ReportBody::from_slice(&body)?.into_report(credential.as_ref())
    }
    .await;

    match result {
        Ok(report) => {
            state.registry.upsert(report, state.clock.now());
            state.metrics.report_accepted();
            Ok(Json(StatusBody::ok()))
        }
        Err(e) => {
            tracing::debug!(error = %e, "Location report rejected");
            state.metrics.report_rejected();
            Err(e)
        }
    }
}

async fn stop_sharing<A: Authenticator>(
    State(state): State<Arc<AppState<A>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StatusBody>> {
    let credential = state.report_credential(&headers).await?;
    let identity = ReportBody::from_slice(&body)?.resolve_identity(credential.as_ref())?;

    state.registry.remove(&identity, state.clock.now());
    state.metrics.stop();

    Ok(Json(StatusBody::ok()))
}

/// Query string of `GET /stream`
#[derive(Debug, Default, Deserialize)]
struct StreamQuery {
    token: Option<String>,
    /// Comma-separated groups to narrow the view to
    groups: Option<String>,
}

impl StreamQuery {
    fn requested_groups(&self) -> BTreeSet<String> {
        self.groups
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }
}

async fn open_stream<A: Authenticator>(
    State(state): State<Arc<AppState<A>>>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let token = query
        .token
        .as_deref()
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(&headers));

    let Some(token) = token else {
        state.metrics.observer_rejected();
        return Err(Error::unauthorized("Missing token"));
    };

    let mut credential = match state.authenticator.authenticate(token).await {
        AuthResult::Accept(credential) => credential,
        AuthResult::Reject(reason) => {
            tracing::debug!(reason = %reason, "Stream rejected");
            state.metrics.observer_rejected();
            return Err(Error::unauthorized(reason));
        }
    };

    let permit = match &state.observer_slots {
        Some(slots) => match Arc::clone(slots).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(
                    observer = %credential.subject,
                    "Stream rejected: observer limit reached"
                );
                state.metrics.observer_rejected();
                return Err(Error::CapacityExceeded(state.config.max_observers));
            }
        },
        None => None,
    };

    credential.permitted = credential.permitted.narrow(&query.requested_groups());
    let session_id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    let ctx = ObserverContext::from_credential(session_id, credential);

    let mut stream = state.broadcaster.subscribe(ctx);
    if let Some(permit) = permit {
        stream = stream.with_permit(permit);
    }

    let events = stream.map(|payload| Ok::<_, Infallible>(Event::default().data(payload)));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.keep_alive_duration())))
}

async fn stats<A: Authenticator>(State(state): State<Arc<AppState<A>>>) -> Json<ServerStats> {
    Json(state.stats())
}
