// =============================================================================
// Central Application State — PulseFeed server
// =============================================================================
//
// Shared by the REST and SSE handlers via `Arc<AppState>`. Streams themselves
// are per-connection and own their state exclusively; what lives here is the
// loaded configuration plus lock-free counters for the health endpoint.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::FeedConfig;

/// Shared server state.
pub struct AppState {
    /// Configuration loaded at startup. Immutable for the process lifetime.
    pub config: FeedConfig,

    /// Number of currently connected feed streams.
    pub active_streams: AtomicU64,

    /// Total messages pushed to subscribers since startup.
    pub messages_sent: AtomicU64,

    /// Instant when the server was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            active_streams: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn stream_opened(&self) {
        self.active_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_closed(&self) {
        // Saturating: a double-close must not wrap the gauge.
        let _ = self
            .active_streams
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
