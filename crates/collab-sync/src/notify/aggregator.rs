//! Notification aggregator — bounded inbox with read/archive lifecycle.

use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use collab_core::config::notifications::NotificationsConfig;
use collab_core::result::AppResult;
use collab_core::traits::store::RecordFilter;
use collab_core::traits::transport::{ChangeEvent, ChangeOperation};
use collab_core::types::{NotificationId, ParticipantId, ScopeKey, WorkspaceId};
use collab_entity::activity::ActivityEvent;
use collab_entity::notification::Notification;
use collab_entity::tables;

use crate::feed::{ChangeFeedListener, FeedSubscription};
use crate::metrics::EngineMetrics;
use crate::notify::priority;
use crate::observer::{Publisher, Subscription};

/// Transforms workspace activity into a typed, prioritized notification
/// inbox for one recipient.
///
/// Retention is bounded: the non-archived count never exceeds the
/// configured maximum, oldest evicted first. Archived entries stay in
/// total storage until [`clear_all`](NotificationAggregator::clear_all).
/// The lifecycle is monotonic: archived entries never un-archive and
/// `read_at` is immutable once set.
pub struct NotificationAggregator {
    recipient: ParticipantId,
    config: NotificationsConfig,
    /// Newest first, archived entries included.
    inbox: Mutex<Vec<Notification>>,
    publisher: Publisher<Vec<Notification>>,
    /// Last arrival/archive/clear, for the dwell policy.
    last_action: Mutex<Instant>,
    metrics: Arc<EngineMetrics>,
    feed: Mutex<Option<FeedSubscription>>,
    dwell_shutdown: CancellationToken,
}

impl NotificationAggregator {
    /// Attach an aggregator for a recipient to a workspace's activity
    /// stream. When the dwell policy is configured, a background task
    /// marks listed notifications read after the quiet period.
    pub(crate) async fn attach(
        recipient: ParticipantId,
        workspace_id: WorkspaceId,
        config: NotificationsConfig,
        listener: &ChangeFeedListener,
        metrics: Arc<EngineMetrics>,
    ) -> AppResult<Arc<Self>> {
        let aggregator = Arc::new(Self {
            recipient,
            config: config.clone(),
            inbox: Mutex::new(Vec::new()),
            publisher: Publisher::new(),
            last_action: Mutex::new(Instant::now()),
            metrics,
            feed: Mutex::new(None),
            dwell_shutdown: CancellationToken::new(),
        });

        let scope = ScopeKey::workspace(workspace_id);
        let filter = RecordFilter::new().eq("scope_id", workspace_id.to_string());

        let weak = Arc::downgrade(&aggregator);
        let feed = listener
            .listen(&scope, tables::ACTIVITIES, filter, move |change| {
                if let Some(aggregator) = weak.upgrade() {
                    aggregator.apply_change(change);
                }
            })
            .await?;
        *aggregator.feed.lock().unwrap_or_else(|e| e.into_inner()) = Some(feed);

        if let Some(dwell_seconds) = config.auto_mark_read_after_seconds {
            let weak = Arc::downgrade(&aggregator);
            let token = aggregator.dwell_shutdown.clone();
            tokio::spawn(run_dwell_policy(
                weak,
                Duration::from_secs(dwell_seconds),
                token,
            ));
        }

        Ok(aggregator)
    }

    /// Non-archived notifications, newest first.
    pub fn list(&self) -> Vec<Notification> {
        self.inbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|n| !n.is_archived)
            .cloned()
            .collect()
    }

    /// Count of unread, non-archived notifications.
    pub fn unread_count(&self) -> usize {
        self.inbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|n| !n.is_archived && !n.is_read)
            .count()
    }

    /// Everything still in storage, archived entries included.
    pub fn total_known(&self) -> usize {
        self.inbox.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Mark one notification read. `read_at` is set on the first call
    /// and never changes afterwards.
    pub fn mark_as_read(&self, id: NotificationId) {
        {
            let mut inbox = self.inbox.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(notification) = inbox.iter_mut().find(|n| n.id == id) {
                if !notification.is_read {
                    notification.is_read = true;
                    notification.read_at = Some(Utc::now());
                }
            }
        }
        self.publish();
    }

    /// Mark every non-archived notification read.
    pub fn mark_all_read(&self) {
        {
            let mut inbox = self.inbox.lock().unwrap_or_else(|e| e.into_inner());
            let now = Utc::now();
            for notification in inbox.iter_mut().filter(|n| !n.is_archived && !n.is_read) {
                notification.is_read = true;
                notification.read_at = Some(now);
            }
        }
        self.publish();
    }

    /// Archive one notification: it leaves `list()` but stays in total
    /// storage until `clear_all`. Archiving is monotonic.
    pub fn archive(&self, id: NotificationId) {
        {
            let mut inbox = self.inbox.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(notification) = inbox.iter_mut().find(|n| n.id == id) {
                notification.is_archived = true;
            }
        }
        self.touch();
        self.publish();
    }

    /// Drop everything, archived entries included.
    pub fn clear_all(&self) {
        self.inbox.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.touch();
        self.publish();
    }

    /// Observe the listed (non-archived) notifications.
    pub fn subscribe(
        &self,
        cb: impl Fn(&Vec<Notification>) + Send + Sync + 'static,
    ) -> Subscription {
        self.publisher.subscribe(cb)
    }

    /// Ingest one activity event addressed to this recipient.
    fn apply_change(&self, change: &ChangeEvent) {
        if change.operation != ChangeOperation::Insert {
            return;
        }
        let Ok(event) = serde_json::from_value::<ActivityEvent>(change.record.clone()) else {
            return;
        };
        self.ingest(&event);
    }

    /// Transform an activity event into an inbox notification. The
    /// recipient's own actions are skipped.
    pub fn ingest(&self, event: &ActivityEvent) {
        if event.actor_id == self.recipient {
            return;
        }

        let (priority, title, message) = priority::classify(event);
        let notification = Notification {
            id: NotificationId::new(),
            recipient_id: self.recipient,
            kind: event.event_type.clone(),
            title,
            message,
            related_entity: format!("{}:{}", event.entity_type, event.entity_id),
            priority,
            is_read: false,
            is_archived: false,
            created_at: event.created_at,
            read_at: None,
        };

        {
            let mut inbox = self.inbox.lock().unwrap_or_else(|e| e.into_inner());
            inbox.insert(0, notification);

            // Bounded retention: evict oldest non-archived first.
            let max = self.config.max_retained;
            while inbox.iter().filter(|n| !n.is_archived).count() > max {
                if let Some(pos) = inbox.iter().rposition(|n| !n.is_archived) {
                    inbox.remove(pos);
                }
            }
        }

        EngineMetrics::incr(&self.metrics.notifications_emitted);
        debug!(recipient = %self.recipient, kind = %event.event_type, "Notification ingested");
        self.touch();
        self.publish();
    }

    fn touch(&self) {
        *self.last_action.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn publish(&self) {
        self.publisher.emit(&self.list());
    }

    fn dwell_deadline(&self, dwell: Duration) -> Instant {
        *self.last_action.lock().unwrap_or_else(|e| e.into_inner()) + dwell
    }
}

impl Drop for NotificationAggregator {
    fn drop(&mut self) {
        self.dwell_shutdown.cancel();
    }
}

/// Auto-mark-as-read policy loop: after a quiet period with no
/// archive/clear action, everything currently listed is marked read.
async fn run_dwell_policy(
    aggregator: Weak<NotificationAggregator>,
    dwell: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let Some(current) = aggregator.upgrade() else {
            return;
        };
        let deadline = current.dwell_deadline(dwell);
        drop(current);

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = time::sleep_until(deadline) => {}
        }

        let Some(current) = aggregator.upgrade() else {
            return;
        };
        // The deadline may have moved while sleeping; only fire when the
        // quiet period truly elapsed.
        if Instant::now() >= current.dwell_deadline(dwell) {
            if current.unread_count() > 0 {
                info!(recipient = %current.recipient, "Dwell elapsed, marking notifications read");
                current.mark_all_read();
            }
            current.touch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;

    use collab_core::types::ActivityId;

    fn make_aggregator(max_retained: usize) -> NotificationAggregator {
        NotificationAggregator {
            recipient: ParticipantId::new(),
            config: NotificationsConfig {
                max_retained,
                auto_mark_read_after_seconds: None,
            },
            inbox: Mutex::new(Vec::new()),
            publisher: Publisher::new(),
            last_action: Mutex::new(Instant::now()),
            metrics: Arc::new(EngineMetrics::new()),
            feed: Mutex::new(None),
            dwell_shutdown: CancellationToken::new(),
        }
    }

    fn event(actor: ParticipantId) -> ActivityEvent {
        ActivityEvent {
            id: ActivityId::new(),
            scope_id: WorkspaceId::new(),
            actor_id: actor,
            event_type: "comment.created".to_string(),
            entity_type: "idea".to_string(),
            entity_id: "i-1".to_string(),
            created_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_own_actions_are_skipped() {
        let aggregator = make_aggregator(10);
        let own = event(aggregator.recipient);
        aggregator.ingest(&own);
        assert!(aggregator.list().is_empty());

        aggregator.ingest(&event(ParticipantId::new()));
        assert_eq!(aggregator.list().len(), 1);
    }

    #[tokio::test]
    async fn test_retention_never_exceeds_max() {
        let aggregator = make_aggregator(3);
        for _ in 0..5 {
            aggregator.ingest(&event(ParticipantId::new()));
        }
        assert_eq!(aggregator.list().len(), 3);
        assert_eq!(aggregator.total_known(), 3);
    }

    #[tokio::test]
    async fn test_archive_hides_but_retains_until_clear() {
        let aggregator = make_aggregator(10);
        aggregator.ingest(&event(ParticipantId::new()));
        aggregator.ingest(&event(ParticipantId::new()));

        let id = aggregator.list()[0].id;
        aggregator.archive(id);

        assert_eq!(aggregator.list().len(), 1);
        assert_eq!(aggregator.total_known(), 2);

        aggregator.clear_all();
        assert_eq!(aggregator.total_known(), 0);
    }

    #[tokio::test]
    async fn test_read_at_is_immutable() {
        let aggregator = make_aggregator(10);
        aggregator.ingest(&event(ParticipantId::new()));
        let id = aggregator.list()[0].id;

        aggregator.mark_as_read(id);
        let first_read_at = aggregator.list()[0].read_at.unwrap();

        aggregator.mark_as_read(id);
        assert_eq!(aggregator.list()[0].read_at.unwrap(), first_read_at);
        assert_eq!(aggregator.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_archived_eviction_prefers_non_archived() {
        let aggregator = make_aggregator(2);
        aggregator.ingest(&event(ParticipantId::new()));
        let archived_id = aggregator.list()[0].id;
        aggregator.archive(archived_id);

        for _ in 0..3 {
            aggregator.ingest(&event(ParticipantId::new()));
        }

        // Archived entry survives eviction; listed count respects max.
        assert_eq!(aggregator.list().len(), 2);
        assert_eq!(aggregator.total_known(), 3);
    }
}
