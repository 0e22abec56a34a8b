//! Engine context — explicit ownership of every shared component.
//!
//! Created once at application start and torn down on shutdown; there is
//! no module-level mutable state anywhere in the engine.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use collab_core::config::CollabConfig;
use collab_core::result::AppResult;
use collab_core::traits::store::RecordStore;
use collab_core::traits::transport::RealtimeTransport;
use collab_core::types::{EventId, ParticipantId, ScopeKey, WorkspaceId};
use collab_entity::presence::PresenceRecord;

use crate::channel::registry::ChannelRegistry;
use crate::coalesce::RequestCoalescer;
use crate::feed::ChangeFeedListener;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::notify::NotificationAggregator;
use crate::presence::heartbeat::Heartbeat;
use crate::presence::tracker::PresenceTracker;
use crate::units::activity::ActivityFeedUnit;
use crate::units::chat::ChatUnit;
use crate::units::registration::RegistrationUnit;

/// Owns the engine's shared components and constructs state units.
pub struct SyncContext {
    config: CollabConfig,
    store: Arc<dyn RecordStore>,
    metrics: Arc<EngineMetrics>,
    registry: Arc<ChannelRegistry>,
    coalescer: Arc<RequestCoalescer>,
    presence: Arc<PresenceTracker>,
    listener: ChangeFeedListener,
}

impl SyncContext {
    /// Build a context over a store and transport.
    pub fn new(
        config: CollabConfig,
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn RealtimeTransport>,
    ) -> Arc<Self> {
        let metrics = Arc::new(EngineMetrics::new());
        let registry = ChannelRegistry::new(config.channel.clone(), transport, metrics.clone());
        let coalescer = RequestCoalescer::new(metrics.clone());
        let presence = PresenceTracker::new(registry.clone(), config.presence.clone());
        let listener = ChangeFeedListener::new(registry.clone());

        Arc::new(Self {
            config,
            store,
            metrics,
            registry,
            coalescer,
            presence,
            listener,
        })
    }

    /// Registration unit for (event, participant).
    pub async fn registration(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<Arc<RegistrationUnit>> {
        RegistrationUnit::attach(
            event_id,
            participant_id,
            self.store.clone(),
            self.coalescer.clone(),
            &self.listener,
        )
        .await
    }

    /// Chat unit for a named channel.
    pub async fn chat(
        &self,
        channel: &str,
        sender_id: ParticipantId,
    ) -> AppResult<Arc<ChatUnit>> {
        ChatUnit::attach(
            channel,
            sender_id,
            self.store.clone(),
            self.coalescer.clone(),
            &self.listener,
            self.config.chat.max_cached_messages,
        )
        .await
    }

    /// Activity feed unit for a workspace.
    pub async fn activity(&self, workspace_id: WorkspaceId) -> AppResult<Arc<ActivityFeedUnit>> {
        ActivityFeedUnit::attach(
            workspace_id,
            self.store.clone(),
            self.coalescer.clone(),
            &self.listener,
            self.config.activity.max_retained_events,
        )
        .await
    }

    /// Notification aggregator for a recipient in a workspace.
    pub async fn notifications(
        &self,
        recipient: ParticipantId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Arc<NotificationAggregator>> {
        NotificationAggregator::attach(
            recipient,
            workspace_id,
            self.config.notifications.clone(),
            &self.listener,
            self.metrics.clone(),
        )
        .await
    }

    /// Start heartbeating the local participant's presence into a scope.
    pub fn heartbeat(&self, scope: &ScopeKey, record: PresenceRecord) -> Heartbeat {
        Heartbeat::start(
            self.presence.scope(scope),
            record,
            Duration::from_secs(self.config.presence.heartbeat_interval_seconds),
        )
    }

    /// The presence tracker.
    pub fn presence(&self) -> &Arc<PresenceTracker> {
        &self.presence
    }

    /// The change-feed listener.
    pub fn listener(&self) -> &ChangeFeedListener {
        &self.listener
    }

    /// The request coalescer.
    pub fn coalescer(&self) -> &Arc<RequestCoalescer> {
        &self.coalescer
    }

    /// The channel registry.
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// The backing store handle.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Engine configuration.
    pub fn config(&self) -> &CollabConfig {
        &self.config
    }

    /// Current counter values.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Close every channel. Units keep their local caches but stop
    /// receiving events.
    pub fn shutdown(&self) {
        info!("Sync context shutting down");
        self.registry.close_all();
    }
}
