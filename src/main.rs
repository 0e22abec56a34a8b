//! Catalyst Collaboration Sync Daemon
//!
//! Headless harness that wires the sync engine over the in-memory
//! backend, runs a scripted peer generating presence/chat/activity
//! traffic, and mirrors the engine's published state into logs. Used
//! for end-to-end smoke runs of the full stack.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing_subscriber::{EnvFilter, fmt};

use collab_core::config::CollabConfig;
use collab_core::error::AppError;
use collab_core::traits::store::RecordStore;
use collab_core::traits::transport::{RealtimeTransport, TransportConnection};
use collab_core::types::{
    ActivityId, EventId, ParticipantId, ScopeKey, SessionId, WorkspaceId,
};
use collab_entity::activity::{ActivityEvent, event_types};
use collab_entity::chat::{ChatMessage, MessageKind};
use collab_entity::presence::PresenceRecord;
use collab_entity::tables;
use collab_store::{MemoryHub, MemoryStore};
use collab_sync::SyncContext;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Daemon error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<CollabConfig, AppError> {
    let env = std::env::var("CATALYST_ENV").unwrap_or_else(|_| "development".to_string());
    CollabConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &CollabConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => fmt().with_env_filter(filter).json().init(),
        _ => fmt().with_env_filter(filter).init(),
    }
}

async fn run(config: CollabConfig) -> Result<(), AppError> {
    let hub = MemoryHub::new();
    let store = MemoryStore::new(hub.clone());
    let ctx = SyncContext::new(config, store.clone(), hub.clone());

    let workspace = WorkspaceId::new();
    let event_id = EventId::new();
    let me = ParticipantId::new();
    let scope = ScopeKey::workspace(workspace);

    // Local participant: heartbeat plus every unit the portal UI uses.
    let record = PresenceRecord::online(me, SessionId::new(), "dashboard");
    let _heartbeat = ctx.heartbeat(&scope, record);

    let activity = ctx.activity(workspace).await?;
    let notifications = ctx.notifications(me, workspace).await?;
    let chat = ctx.chat("general", me).await?;
    let registration = ctx.registration(event_id, me).await?;

    let _presence_sub = ctx.presence().subscribe(&scope, |records| {
        tracing::info!(participants = records.len(), "Presence map updated");
    });
    let _activity_sub = activity.subscribe(|state| {
        tracing::info!(events = state.data.len(), "Activity feed updated");
    });
    let _notification_sub = notifications.subscribe(|list| {
        tracing::info!(listed = list.len(), "Notification inbox updated");
    });
    let _chat_sub = chat.subscribe(|state| {
        tracing::info!(messages = state.data.len(), loading = state.loading, "Chat updated");
    });
    let _registration_sub = registration.subscribe(|state| {
        tracing::info!(
            registered = state.data.is_registered,
            participants = state.data.participant_count,
            "Registration state updated"
        );
    });

    // Scripted peer acting as a second portal client.
    let peer = tokio::spawn(run_peer(hub.clone(), store.clone(), workspace, scope.clone()));

    registration.register().await?;
    chat.send("Welcome to Catalyst!", MessageKind::Text, None)
        .await?;

    tracing::info!("Sync daemon running, Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Signal handler failed: {e}")))?;

    peer.abort();
    ctx.shutdown();
    tracing::info!(metrics = ?ctx.metrics(), "Shutdown complete");
    Ok(())
}

/// Simulated remote participant: heartbeats presence and produces
/// activity and chat traffic through the backing store.
async fn run_peer(
    hub: Arc<MemoryHub>,
    store: Arc<MemoryStore>,
    workspace: WorkspaceId,
    scope: ScopeKey,
) {
    let peer_id = ParticipantId::new();
    let Ok((conn, mut events)) = hub.connect(&scope, 64).await else {
        tracing::warn!("Peer failed to connect");
        return;
    };
    tokio::spawn(async move { while events.recv().await.is_some() {} });

    let mut record = PresenceRecord::online(peer_id, SessionId::new(), "workspace");
    let event_kinds = [
        event_types::IDEA_SUBMITTED,
        event_types::COMMENT_CREATED,
        event_types::CHALLENGE_PUBLISHED,
    ];
    let mut ticker = time::interval(Duration::from_secs(5));
    let mut round = 0usize;

    loop {
        ticker.tick().await;
        round += 1;

        record.last_seen = Utc::now();
        if let Ok(payload) = serde_json::to_value(&record) {
            if let Err(e) = conn.track(payload).await {
                tracing::warn!(error = %e, "Peer presence track failed");
            }
        }

        let activity = ActivityEvent {
            id: ActivityId::new(),
            scope_id: workspace,
            actor_id: peer_id,
            event_type: event_kinds[round % event_kinds.len()].to_string(),
            entity_type: "challenge".to_string(),
            entity_id: format!("c-{round}"),
            created_at: Utc::now(),
            metadata: serde_json::Map::new(),
        };
        if let Ok(payload) = serde_json::to_value(&activity) {
            if let Err(e) = store.insert(tables::ACTIVITIES, payload).await {
                tracing::warn!(error = %e, "Peer activity insert failed");
            }
        }

        if round % 3 == 0 {
            let message = ChatMessage::text(peer_id, "general", &format!("Update #{round}"));
            if let Ok(payload) = serde_json::to_value(&message) {
                if let Err(e) = store.insert(tables::CHAT_MESSAGES, payload).await {
                    tracing::warn!(error = %e, "Peer chat insert failed");
                }
            }
        }
    }
}
