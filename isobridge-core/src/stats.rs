//! Relay counters shared by the pumps and the monitor.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free relay counters.
///
/// Each pump increments its own counters; the monitor and the shutdown path
/// read a [`StatsSnapshot`]. Counters are independent, so `Relaxed` ordering
/// is enough.
#[derive(Debug, Default)]
pub struct RelayStats {
    client_to_backend: AtomicU64,
    backend_to_client: AtomicU64,
    diagnostic_lines: AtomicU64,
    paths_translated: AtomicU64,
    raw_passthrough: AtomicU64,
    dropped_dead_backend: AtomicU64,
    oversized_dropped: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub client_to_backend: u64,
    pub backend_to_client: u64,
    pub diagnostic_lines: u64,
    pub paths_translated: u64,
    pub raw_passthrough: u64,
    pub dropped_dead_backend: u64,
    pub oversized_dropped: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_client_to_backend(&self) {
        self.client_to_backend.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_to_client(&self) {
        self.backend_to_client.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_diagnostic_line(&self) {
        self.diagnostic_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_paths_translated(&self, count: usize) {
        if count > 0 {
            self.paths_translated
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_raw_passthrough(&self) {
        self.raw_passthrough.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_dead_backend(&self) {
        self.dropped_dead_backend.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oversized(&self) {
        self.oversized_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            client_to_backend: self.client_to_backend.load(Ordering::Relaxed),
            backend_to_client: self.backend_to_client.load(Ordering::Relaxed),
            diagnostic_lines: self.diagnostic_lines.load(Ordering::Relaxed),
            paths_translated: self.paths_translated.load(Ordering::Relaxed),
            raw_passthrough: self.raw_passthrough.load(Ordering::Relaxed),
            dropped_dead_backend: self.dropped_dead_backend.load(Ordering::Relaxed),
            oversized_dropped: self.oversized_dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "in={} out={} stderr={} translated={} raw={} dropped={} oversized={}",
            self.client_to_backend,
            self.backend_to_client,
            self.diagnostic_lines,
            self.paths_translated,
            self.raw_passthrough,
            self.dropped_dead_backend,
            self.oversized_dropped,
        )
    }
}
