//! Snapshot broadcaster
//!
//! Each observer connection gets its own task that wakes on a fixed tick,
//! snapshots the registry, filters it for the observer and pushes the result
//! only when it differs from what the observer last received.
//!
//! ```text
//!   tick ──► registry.snapshot(now) ──► filter(permitted) ──► to_json
//!                                                               │
//!                                     same as last_emitted? ────┤
//!                                        yes: skip              │ no
//!                                                               ▼
//!                                              mpsc::Sender ──► ObserverStream ──► SSE
//! ```
//!
//! The task owns the sending half of a bounded channel. Dropping the
//! [`ObserverStream`] (client gone, transport error) closes the channel, which
//! the task notices before its next tick and exits. [`Broadcaster::shutdown`]
//! ends every task at once.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::time::MissedTickBehavior;

use crate::registry::{Clock, LocationRegistry};
use crate::stats::ServerMetrics;

use super::context::ObserverContext;
use super::state::{ObserverPhase, ObserverState};

/// Default interval between evaluations
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest tick accepted; `tokio::time::interval` rejects zero
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Default number of undelivered payloads buffered per observer
pub const DEFAULT_STREAM_BUFFER: usize = 16;

/// Spawns one tick loop per observer connection
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<LocationRegistry>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ServerMetrics>,
    tick_interval: Duration,
    buffer: usize,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`, reading time from `clock`
    pub fn new(registry: Arc<LocationRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            clock,
            metrics: Arc::new(ServerMetrics::new()),
            tick_interval: DEFAULT_TICK_INTERVAL,
            buffer: DEFAULT_STREAM_BUFFER,
            shutdown: Arc::new(watch::channel(false).0),
        }
    }

    /// Set the tick interval (minimum 1ms)
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Set the per-observer buffer size (minimum 1)
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Share counters with the server
    pub fn metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get the shared counters
    pub fn server_metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    /// Open a stream for `ctx`
    ///
    /// Must be called within a tokio runtime. The first event arrives on the
    /// first tick, which fires immediately.
    pub fn subscribe(&self, ctx: ObserverContext) -> ObserverStream {
        let (tx, rx) = mpsc::channel(self.buffer);
        let session_id = ctx.session_id;

        self.metrics.observer_opened();
        tokio::spawn(self.clone().run(ctx, tx));

        ObserverStream {
            session_id,
            rx,
            _permit: None,
        }
    }

    /// Close every open stream
    ///
    /// Tick loops exit at once, ending their observers' streams.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Drive one observer until its stream is dropped or the broadcaster is
    /// shut down
    ///
    /// Returns the final, closed, state.
    pub async fn run(self, ctx: ObserverContext, tx: mpsc::Sender<String>) -> ObserverState {
        let mut state = ObserverState::new(ctx.permitted.clone());
        let mut shutdown = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            session_id = ctx.session_id,
            observer = %ctx.observer,
            permitted = %ctx.permitted,
            "Observer stream opened"
        );

        while state.phase == ObserverPhase::Active {
            tokio::select! {
                biased;

                _ = tx.closed() => break,

                _ = shutdown_requested(&mut shutdown) => break,

                _ = ticker.tick() => {
                    let snapshot = self.registry.snapshot(self.clock.now());

                    let payload = match state.on_tick(&snapshot) {
                        Ok(Some(payload)) => payload,
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::error!(
                                session_id = ctx.session_id,
                                error = %e,
                                "Failed to serialize snapshot"
                            );
                            continue;
                        }
                    };

                    match tx.try_send(payload.clone()) {
                        Ok(()) => {
                            tracing::trace!(
                                session_id = ctx.session_id,
                                devices = snapshot.len(),
                                bytes = payload.len(),
                                "Observer update sent"
                            );
                            state.commit(payload);
                            self.metrics.emission();
                        }
                        Err(TrySendError::Full(_)) => {
                            tracing::debug!(
                                session_id = ctx.session_id,
                                "Observer lagging, update deferred"
                            );
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
            }
        }

        state.close();
        self.metrics.observer_closed();

        tracing::info!(
            session_id = ctx.session_id,
            observer = %ctx.observer,
            ticks = state.ticks,
            emissions = state.emissions,
            duration_secs = ctx.duration().as_secs(),
            "Observer stream closed"
        );

        state
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Receiving half of an observer connection
///
/// Yields serialized filtered state. Dropping it closes the connection's tick
/// loop.
pub struct ObserverStream {
    session_id: u64,
    rx: mpsc::Receiver<String>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl ObserverStream {
    /// Session this stream belongs to
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Hold `permit` for as long as the stream is alive
    pub fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }

    /// Wait for the next update
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Stream for ObserverStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::PermittedGroups;
    use crate::registry::{LocationReport, ManualClock, Timestamp};

    struct Fixture {
        registry: Arc<LocationRegistry>,
        clock: ManualClock,
        metrics: Arc<ServerMetrics>,
        broadcaster: Broadcaster,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(LocationRegistry::new());
        let clock = ManualClock::new(Timestamp::from_secs(1));
        let metrics = Arc::new(ServerMetrics::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::new(clock.clone()))
            .metrics(Arc::clone(&metrics));

        Fixture {
            registry,
            clock,
            metrics,
            broadcaster,
        }
    }

    fn observer(permitted: PermittedGroups) -> ObserverContext {
        ObserverContext::new(1, "tester", permitted)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_emits_current_state() {
        let f = fixture();
        f.registry
            .upsert(LocationReport::new("alice").groups(["fam"]), f.clock.now());

        let mut stream = f.broadcaster.subscribe(observer(PermittedGroups::Unrestricted));
        let payload = stream.recv().await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["alice"]["id"], "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_emission_without_change() {
        let f = fixture();
        let mut stream = f.broadcaster.subscribe(observer(PermittedGroups::Unrestricted));
        assert_eq!(stream.recv().await.as_deref(), Some("{}"));

        // Ticks at t=2, t=3, ... with no intervening writes
        f.clock.advance(Duration::from_secs(1));
        let next = tokio::time::timeout(Duration::from_secs(5), stream.recv()).await;
        assert!(next.is_err());
        assert_eq!(f.metrics.snapshot(0).emissions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_is_pushed_once() {
        let f = fixture();
        let mut stream = f.broadcaster.subscribe(observer(PermittedGroups::Unrestricted));
        assert_eq!(stream.recv().await.as_deref(), Some("{}"));

        f.registry
            .upsert(LocationReport::new("bob").position(1.0, 2.0), f.clock.now());
        let payload = stream.recv().await.unwrap();
        assert!(payload.contains("\"bob\""));

        let next = tokio::time::timeout(Duration::from_secs(3), stream.recv()).await;
        assert!(next.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_is_filtered() {
        let f = fixture();
        let now = f.clock.now();
        f.registry
            .upsert(LocationReport::new("alice").groups(["fam"]), now);
        f.registry
            .upsert(LocationReport::new("bob").groups(["work"]), now);

        let mut stream = f.broadcaster.subscribe(observer(PermittedGroups::only(["fam"])));
        let value: serde_json::Value =
            serde_json::from_str(&stream.recv().await.unwrap()).unwrap();

        assert!(value.get("alice").is_some());
        assert!(value.get("bob").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_reaches_observer() {
        let f = fixture();
        f.registry.upsert(LocationReport::new("alice"), f.clock.now());

        let mut stream = f.broadcaster.subscribe(observer(PermittedGroups::Unrestricted));
        assert!(stream.recv().await.unwrap().contains("alice"));

        f.clock.advance(Duration::from_secs(31));
        assert_eq!(stream.recv().await.as_deref(), Some("{}"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_ends_loop() {
        let f = fixture();
        let mut stream = f.broadcaster.subscribe(observer(PermittedGroups::Unrestricted));
        stream.recv().await;
        assert_eq!(f.metrics.snapshot(0).active_observers, 1);

        drop(stream);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(f.metrics.snapshot(0).active_observers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_closed_state() {
        let f = fixture();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let state = f
            .broadcaster
            .run(observer(PermittedGroups::Unrestricted), tx)
            .await;

        assert_eq!(state.phase, ObserverPhase::Closed);
        assert_eq!(state.emissions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_streams() {
        let f = fixture();
        let mut first = f.broadcaster.subscribe(observer(PermittedGroups::Unrestricted));
        let mut second = f.broadcaster.subscribe(observer(PermittedGroups::only(["fam"])));
        assert_eq!(first.recv().await.as_deref(), Some("{}"));
        assert_eq!(second.recv().await.as_deref(), Some("{}"));

        f.broadcaster.shutdown();

        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, None);
        assert_eq!(f.metrics.snapshot(0).active_observers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_after_shutdown_closes_immediately() {
        let f = fixture();
        f.broadcaster.shutdown();

        let mut stream = f.broadcaster.subscribe(observer(PermittedGroups::Unrestricted));
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tick_interval_clamped() {
        let f = fixture();
        let broadcaster = f.broadcaster.clone().tick_interval(Duration::ZERO);

        let mut stream = broadcaster.subscribe(observer(PermittedGroups::Unrestricted));
        assert_eq!(stream.recv().await.as_deref(), Some("{}"));

        f.registry.upsert(LocationReport::new("alice"), f.clock.now());
        assert!(stream.recv().await.unwrap().contains("alice"));

        drop(stream);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.metrics.snapshot(0).active_observers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagging_observer_gets_latest_state() {
        let f = fixture();
        let broadcaster = f.broadcaster.clone().buffer(1);
        let mut stream = broadcaster.subscribe(observer(PermittedGroups::Unrestricted));

        // Let the first payload fill the buffer, then change state while it is full
        tokio::time::sleep(Duration::from_millis(10)).await;
        f.registry.upsert(LocationReport::new("alice"), f.clock.now());
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(stream.recv().await.as_deref(), Some("{}"));
        let latest = stream.recv().await.unwrap();
        assert!(latest.contains("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_are_independent() {
        let f = fixture();
        let mut fam = f.broadcaster.subscribe(ObserverContext::new(
            1,
            "a",
            PermittedGroups::only(["fam"]),
        ));
        let work = f.broadcaster.subscribe(ObserverContext::new(
            2,
            "b",
            PermittedGroups::only(["work"]),
        ));
        assert_eq!(fam.session_id(), 1);
        assert_eq!(fam.recv().await.as_deref(), Some("{}"));

        // Closing one observer leaves the other ticking
        drop(work);
        f.registry
            .upsert(LocationReport::new("alice").groups(["fam"]), f.clock.now());

        assert!(fam.recv().await.unwrap().contains("alice"));
        assert_eq!(f.metrics.snapshot(0).active_observers, 1);
    }
}
