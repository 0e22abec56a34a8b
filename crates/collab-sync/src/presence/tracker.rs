//! Presence tracker — maintains the ephemeral participant map per scope.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tracing::warn;

use collab_core::config::presence::PresenceConfig;
use collab_core::result::AppResult;
use collab_core::traits::transport::PresenceEvent;
use collab_core::types::{ParticipantId, ScopeKey};
use collab_entity::presence::PresenceRecord;

use crate::channel::registry::{ChannelGuard, ChannelRegistry};
use crate::channel::session::ChannelSession;
use crate::observer::{Publisher, Subscription};

/// Tracks presence for all scopes the engine participates in.
pub struct PresenceTracker {
    registry: Arc<ChannelRegistry>,
    config: PresenceConfig,
    scopes: DashMap<String, Arc<ScopePresence>>,
}

impl PresenceTracker {
    /// Creates a tracker over the channel registry.
    pub fn new(registry: Arc<ChannelRegistry>, config: PresenceConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            config,
            scopes: DashMap::new(),
        })
    }

    /// Get (or create) the presence state for a scope. Creation attaches
    /// to the scope's channel and starts consuming protocol events.
    pub fn scope(&self, scope: &ScopeKey) -> Arc<ScopePresence> {
        self.scopes
            .entry(scope.as_str().to_string())
            .or_insert_with(|| {
                ScopePresence::attach(
                    &self.registry,
                    scope,
                    Duration::seconds(self.config.stale_after_seconds as i64),
                )
            })
            .clone()
    }

    /// Publish or update the local participant's presence in a scope.
    pub async fn track(&self, scope: &ScopeKey, record: &PresenceRecord) -> AppResult<()> {
        self.scope(scope).track(record).await
    }

    /// Observe the full participant map of a scope. The callback fires
    /// synchronously after each applied protocol event.
    pub fn subscribe(
        &self,
        scope: &ScopeKey,
        cb: impl Fn(&Vec<PresenceRecord>) + Send + Sync + 'static,
    ) -> Subscription {
        self.scope(scope).subscribe(cb)
    }

    /// Participants currently online in a scope (staleness filtered).
    pub fn online_participants(&self, scope: &ScopeKey) -> Vec<PresenceRecord> {
        self.scope(scope).online_participants()
    }

    /// Full raw snapshot of a scope, including possibly-stale entries
    /// retained for UI continuity.
    pub fn snapshot(&self, scope: &ScopeKey) -> Vec<PresenceRecord> {
        self.scope(scope).snapshot()
    }

    /// Detach from a scope, releasing its channel reference.
    pub fn detach(&self, scope: &ScopeKey) {
        self.scopes.remove(scope.as_str());
    }
}

/// Presence state of one scope.
pub struct ScopePresence {
    stale_after: Duration,
    map: Mutex<HashMap<ParticipantId, PresenceRecord>>,
    publisher: Publisher<Vec<PresenceRecord>>,
    guard: ChannelGuard,
    _presence_sub: Subscription,
}

impl ScopePresence {
    fn attach(registry: &Arc<ChannelRegistry>, scope: &ScopeKey, stale_after: Duration) -> Arc<Self> {
        let guard = registry.open(scope);
        let session = guard.session().clone();

        Arc::new_cyclic(|weak: &Weak<ScopePresence>| {
            let weak = weak.clone();
            let presence_sub = session.subscribe_presence(move |event| {
                if let Some(presence) = weak.upgrade() {
                    presence.apply(event);
                }
            });

            ScopePresence {
                stale_after,
                map: Mutex::new(HashMap::new()),
                publisher: Publisher::new(),
                guard,
                _presence_sub: presence_sub,
            }
        })
    }

    /// The channel session presence is multiplexed on.
    pub fn session(&self) -> &Arc<ChannelSession> {
        self.guard.session()
    }

    /// Publish or update the local participant's presence payload.
    pub async fn track(&self, record: &PresenceRecord) -> AppResult<()> {
        self.session().track(serde_json::to_value(record)?).await
    }

    /// Withdraw the local participant's presence.
    pub async fn untrack(&self) -> AppResult<()> {
        self.session().untrack().await
    }

    /// Observe the participant map.
    pub fn subscribe(
        &self,
        cb: impl Fn(&Vec<PresenceRecord>) + Send + Sync + 'static,
    ) -> Subscription {
        self.publisher.subscribe(cb)
    }

    /// Participants currently online (staleness filtered). Absence of a
    /// recent heartbeat is implicit offline, never an error.
    pub fn online_participants(&self) -> Vec<PresenceRecord> {
        let now = Utc::now();
        self.map
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|record| record.is_online(self.stale_after, now))
            .cloned()
            .collect()
    }

    /// Full raw snapshot, stale entries included.
    pub fn snapshot(&self) -> Vec<PresenceRecord> {
        self.map
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Apply one presence protocol event and republish the map.
    fn apply(&self, event: &PresenceEvent) {
        {
            let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
            match event {
                // Authoritative snapshot replaces the whole map,
                // last-writer-wins per key; this heals any drift from
                // missed incremental events.
                PresenceEvent::Sync(snapshot) => {
                    map.clear();
                    for payload in snapshot.values() {
                        if let Some(record) = decode_record(payload) {
                            map.insert(record.participant_id, record);
                        }
                    }
                }
                PresenceEvent::Join(records) => {
                    for payload in records {
                        if let Some(record) = decode_record(payload) {
                            map.insert(record.participant_id, record);
                        }
                    }
                }
                PresenceEvent::Leave(participants) => {
                    for raw in participants {
                        match raw.parse::<ParticipantId>() {
                            Ok(id) => {
                                map.remove(&id);
                            }
                            Err(e) => warn!(raw = %raw, error = %e, "Unparseable leave participant id"),
                        }
                    }
                }
            }
        }

        self.publisher.emit(&self.snapshot());
    }
}

fn decode_record(payload: &Value) -> Option<PresenceRecord> {
    match serde_json::from_value(payload.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "Dropping malformed presence payload");
            None
        }
    }
}
