//! Shared test helpers for integration tests.

use std::sync::Arc;
use std::time::Duration;

use collab_core::config::CollabConfig;
use collab_store::{MemoryHub, MemoryStore};
use collab_sync::SyncContext;

/// One engine client over a shared in-memory backend.
pub struct TestHarness {
    /// The realtime hub shared by every client.
    pub hub: Arc<MemoryHub>,
    /// The backing store shared by every client.
    pub store: Arc<MemoryStore>,
    /// The engine context under test.
    pub ctx: Arc<SyncContext>,
}

impl TestHarness {
    /// Build a harness with test-friendly timings.
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    /// Build a harness with an explicit configuration.
    pub fn with_config(config: CollabConfig) -> Self {
        let hub = MemoryHub::new();
        let store = MemoryStore::new(hub.clone());
        let ctx = SyncContext::new(config, store.clone(), hub.clone());
        Self { hub, store, ctx }
    }

    /// A second engine client attached to the same backend, acting as a
    /// remote participant's browser session.
    pub fn peer(&self) -> Arc<SyncContext> {
        SyncContext::new(fast_config(), self.store.clone(), self.hub.clone())
    }
}

/// Short timings so reconnect/staleness paths settle quickly.
pub fn fast_config() -> CollabConfig {
    let mut config = CollabConfig::default();
    config.channel.backoff_base_ms = 10;
    config.channel.backoff_cap_ms = 50;
    config.channel.max_reconnect_attempts = 3;
    config.presence.heartbeat_interval_seconds = 1;
    config.presence.stale_after_seconds = 1;
    config
}

/// Poll until `cond` holds or the timeout elapses. Returns whether the
/// condition was met.
pub async fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Default settle timeout for event propagation.
pub const SETTLE: Duration = Duration::from_secs(2);
