//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters covering the engine's hot paths.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Channels opened over the process lifetime.
    pub channels_opened: AtomicU64,
    /// Channels fully closed (last consumer detached).
    pub channels_closed: AtomicU64,
    /// Reconnect attempts across all channels.
    pub reconnect_attempts: AtomicU64,
    /// Change-feed events dispatched to listeners.
    pub feed_events: AtomicU64,
    /// Coalescer calls joined onto an existing in-flight request.
    pub coalescer_hits: AtomicU64,
    /// Coalescer calls that started a fresh request.
    pub coalescer_misses: AtomicU64,
    /// Notifications delivered into inboxes.
    pub notifications_emitted: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Channels opened.
    pub channels_opened: u64,
    /// Channels closed.
    pub channels_closed: u64,
    /// Reconnect attempts.
    pub reconnect_attempts: u64,
    /// Feed events dispatched.
    pub feed_events: u64,
    /// Coalescer hits.
    pub coalescer_hits: u64,
    /// Coalescer misses.
    pub coalescer_misses: u64,
    /// Notifications emitted.
    pub notifications_emitted: u64,
}

impl EngineMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            channels_opened: self.channels_opened.load(Ordering::Relaxed),
            channels_closed: self.channels_closed.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            feed_events: self.feed_events.load(Ordering::Relaxed),
            coalescer_hits: self.coalescer_hits.load(Ordering::Relaxed),
            coalescer_misses: self.coalescer_misses.load(Ordering::Relaxed),
            notifications_emitted: self.notifications_emitted.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
