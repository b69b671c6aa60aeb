//! Statistics for the location server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Server-wide counters, shared by handlers and broadcasters
#[derive(Debug)]
pub struct ServerMetrics {
    started_at: Instant,
    reports_accepted: AtomicU64,
    reports_rejected: AtomicU64,
    stops: AtomicU64,
    observers_opened: AtomicU64,
    observers_closed: AtomicU64,
    observers_rejected: AtomicU64,
    emissions: AtomicU64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            reports_accepted: AtomicU64::new(0),
            reports_rejected: AtomicU64::new(0),
            stops: AtomicU64::new(0),
            observers_opened: AtomicU64::new(0),
            observers_closed: AtomicU64::new(0),
            observers_rejected: AtomicU64::new(0),
            emissions: AtomicU64::new(0),
        }
    }

    pub fn report_accepted(&self) {
        self.reports_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report_rejected(&self) {
        self.reports_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observer_opened(&self) {
        self.observers_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observer_closed(&self) {
        self.observers_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observer_rejected(&self) {
        self.observers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn emission(&self) {
        self.emissions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self, live_devices: usize) -> ServerStats {
        let opened = self.observers_opened.load(Ordering::Relaxed);
        let closed = self.observers_closed.load(Ordering::Relaxed);

        ServerStats {
            uptime: self.started_at.elapsed(),
            live_devices,
            reports_accepted: self.reports_accepted.load(Ordering::Relaxed),
            reports_rejected: self.reports_rejected.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            observers_opened: opened,
            active_observers: opened.saturating_sub(closed),
            observers_rejected: self.observers_rejected.load(Ordering::Relaxed),
            emissions: self.emissions.load(Ordering::Relaxed),
        }
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerStats {
    /// Uptime
    #[serde(serialize_with = "serialize_secs")]
    pub uptime: Duration,
    /// Records live at the time of the snapshot
    pub live_devices: usize,
    /// Location reports stored
    pub reports_accepted: u64,
    /// Location reports refused (validation or auth)
    pub reports_rejected: u64,
    /// Stop-sharing requests handled
    pub stops: u64,
    /// Streams ever opened
    pub observers_opened: u64,
    /// Streams currently open
    pub active_observers: u64,
    /// Streams refused (auth or capacity)
    pub observers_rejected: u64,
    /// Events pushed to observers
    pub emissions: u64,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
