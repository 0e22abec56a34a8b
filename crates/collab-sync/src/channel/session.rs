//! One channel session per scope: owns the transport connection, routes
//! change and presence events, and reconnects with bounded backoff.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use collab_core::config::channel::ChannelConfig;
use collab_core::result::AppResult;
use collab_core::traits::store::RecordFilter;
use collab_core::traits::transport::{
    ChangeEvent, PresenceEvent, RealtimeTransport, TransportConnection, TransportEvent,
};
use collab_core::types::ScopeKey;

use crate::metrics::EngineMetrics;
use crate::observer::{Publisher, Subscription};

use super::status::ChannelStatus;

/// Synchronous change-event handler registered by a feed listener.
pub(crate) type ChangeHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct FeedRegistration {
    id: u64,
    table: String,
    filter: RecordFilter,
    handler: ChangeHandler,
}

/// One logical pub/sub channel for a scope.
///
/// All consumers of the same scope share one session through the
/// registry; the session is the only writer of its status field.
pub struct ChannelSession {
    scope: ScopeKey,
    config: ChannelConfig,
    transport: Arc<dyn RealtimeTransport>,
    metrics: Arc<EngineMetrics>,
    status: Mutex<ChannelStatus>,
    status_pub: Publisher<ChannelStatus>,
    presence_pub: Publisher<PresenceEvent>,
    feeds: Mutex<Vec<FeedRegistration>>,
    next_feed_id: AtomicU64,
    /// Last presence payload tracked locally; re-tracked on reconnect.
    tracked: Mutex<Option<Value>>,
    conn: Mutex<Option<Arc<dyn TransportConnection>>>,
    pub(crate) refs: AtomicUsize,
    shutdown: CancellationToken,
}

impl ChannelSession {
    /// Create a session and start its connection task.
    pub(crate) fn spawn(
        scope: ScopeKey,
        config: ChannelConfig,
        transport: Arc<dyn RealtimeTransport>,
        metrics: Arc<EngineMetrics>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            scope,
            config,
            transport,
            metrics,
            status: Mutex::new(ChannelStatus::Disconnected),
            status_pub: Publisher::new(),
            presence_pub: Publisher::new(),
            feeds: Mutex::new(Vec::new()),
            next_feed_id: AtomicU64::new(1),
            tracked: Mutex::new(None),
            conn: Mutex::new(None),
            refs: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(session.clone().run());
        session
    }

    /// Current connection status.
    pub fn status(&self) -> ChannelStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Observe status changes. Delivery is synchronous with the
    /// transition, so downstream components never read a stale status.
    pub fn subscribe_status(&self, cb: impl Fn(&ChannelStatus) + Send + Sync + 'static) -> Subscription {
        self.status_pub.subscribe(cb)
    }

    /// Observe presence protocol events for this scope.
    pub fn subscribe_presence(
        &self,
        cb: impl Fn(&PresenceEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.presence_pub.subscribe(cb)
    }

    /// Scope key this session serves.
    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// Publish the local participant's presence payload; re-tracked
    /// automatically after every reconnect.
    pub async fn track(&self, record: Value) -> AppResult<()> {
        *self.tracked.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
        let conn = self.current_conn();
        match conn {
            Some(conn) => conn.track(record).await,
            None => Ok(()),
        }
    }

    /// Withdraw the local participant's presence.
    pub async fn untrack(&self) -> AppResult<()> {
        *self.tracked.lock().unwrap_or_else(|e| e.into_inner()) = None;
        match self.current_conn() {
            Some(conn) => conn.untrack().await,
            None => Ok(()),
        }
    }

    /// Register a change-feed handler for (table, filter).
    pub(crate) async fn add_feed(
        &self,
        table: &str,
        filter: RecordFilter,
        handler: ChangeHandler,
    ) -> AppResult<u64> {
        let id = self.next_feed_id.fetch_add(1, Ordering::Relaxed);
        self.feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(FeedRegistration {
                id,
                table: table.to_string(),
                filter: filter.clone(),
                handler,
            });

        if let Some(conn) = self.current_conn() {
            conn.subscribe_changes(table, &filter).await?;
        }
        Ok(id)
    }

    /// Remove a feed registration; drops the transport subscription when
    /// no other registration shares the (table, filter) pair.
    pub(crate) async fn remove_feed(&self, id: u64) {
        let removed = {
            let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
            let Some(pos) = feeds.iter().position(|f| f.id == id) else {
                return;
            };
            let removed = feeds.remove(pos);
            let shared = feeds
                .iter()
                .any(|f| f.table == removed.table && f.filter == removed.filter);
            (!shared).then_some((removed.table, removed.filter))
        };

        if let (Some((table, filter)), Some(conn)) = (removed, self.current_conn()) {
            if let Err(e) = conn.unsubscribe_changes(&table, &filter).await {
                debug!(scope = %self.scope, error = %e, "Feed unsubscribe failed");
            }
        }
    }

    /// Close the session. Idempotent; invoked by the registry when the
    /// last consumer detaches.
    pub(crate) fn close(&self) {
        self.shutdown.cancel();
        self.set_status(ChannelStatus::Closed);
    }

    fn current_conn(&self) -> Option<Arc<dyn TransportConnection>> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_status(&self, next: ChannelStatus) {
        {
            let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
            if *status == next || *status == ChannelStatus::Closed {
                return;
            }
            *status = next;
        }
        debug!(scope = %self.scope, status = next.as_str(), "Channel status changed");
        self.status_pub.emit(&next);
    }

    async fn run(self: Arc<Self>) {
        let mut first = true;
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            self.set_status(if first {
                ChannelStatus::Connecting
            } else {
                ChannelStatus::Reconnecting
            });

            let Some((conn, mut rx)) = self.connect_with_backoff().await else {
                if !self.shutdown.is_cancelled() {
                    warn!(scope = %self.scope, "Reconnect budget exhausted, channel in error state");
                    self.set_status(ChannelStatus::Error);
                }
                return;
            };

            // Expose the connection before re-establishing so concurrent
            // track/add_feed calls reach the transport directly; the hub
            // treats duplicate subscribe/track as idempotent upserts.
            *self.conn.lock().unwrap_or_else(|e| e.into_inner()) = Some(conn.clone());
            if let Err(e) = self.reestablish(&conn).await {
                warn!(scope = %self.scope, error = %e, "Failed to re-establish subscriptions");
                *self.conn.lock().unwrap_or_else(|e| e.into_inner()) = None;
                conn.close().await;
                first = false;
                continue;
            }

            self.set_status(ChannelStatus::Subscribed);
            info!(scope = %self.scope, "Channel subscribed");
            first = false;

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        conn.close().await;
                        *self.conn.lock().unwrap_or_else(|e| e.into_inner()) = None;
                        return;
                    }
                    event = rx.recv() => match event {
                        Some(TransportEvent::Change(change)) => self.dispatch_change(&change),
                        Some(TransportEvent::Presence(presence)) => {
                            self.presence_pub.emit(&presence);
                        }
                        Some(TransportEvent::Dropped { reason }) => {
                            warn!(scope = %self.scope, reason = %reason, "Channel dropped");
                            break;
                        }
                        None => {
                            warn!(scope = %self.scope, "Transport event stream ended");
                            break;
                        }
                    }
                }
            }

            *self.conn.lock().unwrap_or_else(|e| e.into_inner()) = None;
        }
    }

    /// Attempt to connect with exponential backoff, up to the configured
    /// budget. Returns `None` on exhaustion or shutdown.
    async fn connect_with_backoff(
        &self,
    ) -> Option<(
        Arc<dyn TransportConnection>,
        mpsc::Receiver<TransportEvent>,
    )> {
        for attempt in 0..self.config.max_reconnect_attempts {
            if attempt > 0 {
                EngineMetrics::incr(&self.metrics.reconnect_attempts);
            }

            match self
                .transport
                .connect(&self.scope, self.config.event_buffer_size)
                .await
            {
                Ok(pair) => return Some(pair),
                Err(e) => {
                    debug!(
                        scope = %self.scope,
                        attempt = attempt + 1,
                        error = %e,
                        "Connect attempt failed"
                    );
                    if attempt + 1 == self.config.max_reconnect_attempts {
                        break;
                    }
                    let delay = self.backoff_delay(attempt);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return None,
                        _ = time::sleep(delay) => {}
                    }
                }
            }
        }
        None
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base_ms;
        let cap = self.config.backoff_cap_ms;
        let exp = base.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(exp.min(cap))
    }

    /// Re-issue every feed subscription and re-track presence on a fresh
    /// connection.
    async fn reestablish(&self, conn: &Arc<dyn TransportConnection>) -> AppResult<()> {
        let pairs: Vec<(String, RecordFilter)> = self
            .feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|f| (f.table.clone(), f.filter.clone()))
            .collect();
        for (table, filter) in pairs {
            conn.subscribe_changes(&table, &filter).await?;
        }

        let tracked = self
            .tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(record) = tracked {
            conn.track(record).await?;
        }
        Ok(())
    }

    fn dispatch_change(&self, change: &ChangeEvent) {
        let handlers: Vec<ChangeHandler> = self
            .feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|f| f.table == change.table && f.filter.matches(&change.record))
            .map(|f| f.handler.clone())
            .collect();

        for handler in handlers {
            EngineMetrics::incr(&self.metrics.feed_events);
            handler(change);
        }
    }
}
