//! In-memory realtime hub: routes change notifications to subscribed
//! connections and hosts one presence room per scope.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use collab_core::error::AppError;
use collab_core::result::AppResult;
use collab_core::traits::store::RecordFilter;
use collab_core::traits::transport::{
    ChangeEvent, ChangeOperation, PresenceEvent, RealtimeTransport, TransportConnection,
    TransportEvent,
};
use collab_core::types::ScopeKey;

/// One presence room per scope.
#[derive(Default)]
struct Room {
    /// Participant id → last tracked payload.
    presence: HashMap<String, Value>,
    /// Live connections attached to the scope.
    connections: Vec<Arc<HubConnection>>,
}

/// In-memory realtime hub.
///
/// Implements [`RealtimeTransport`]; each connect yields a connection
/// whose event receiver preserves per-connection delivery order.
/// Fault-injection hooks let tests drop connections silently and fail
/// upcoming connect attempts.
pub struct MemoryHub {
    rooms: DashMap<String, Room>,
    next_conn_id: AtomicU64,
    /// Number of upcoming connect attempts to reject.
    connect_failures: AtomicU32,
    self_ref: Weak<MemoryHub>,
}

impl MemoryHub {
    /// Create a new hub.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            rooms: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
            connect_failures: AtomicU32::new(0),
            self_ref: weak.clone(),
        })
    }

    /// Reject the next `n` connect attempts with a transport error.
    pub fn set_connect_failures(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Drop every connection in a scope without emitting presence leaves,
    /// simulating a silent transport failure.
    pub async fn silent_drop(&self, scope: &ScopeKey) {
        let victims: Vec<Arc<HubConnection>> = match self.rooms.get_mut(scope.as_str()) {
            Some(mut room) => room.connections.drain(..).collect(),
            None => Vec::new(),
        };

        for conn in victims {
            conn.alive.store(false, Ordering::SeqCst);
            let _ = conn
                .tx
                .send(TransportEvent::Dropped {
                    reason: "transport failure".to_string(),
                })
                .await;
        }
    }

    /// Drop only the connections that tracked the given participant,
    /// again without presence leaves. Peer connections stay live.
    pub async fn silent_drop_participant(&self, scope: &ScopeKey, participant: &str) {
        let victims: Vec<Arc<HubConnection>> = match self.rooms.get_mut(scope.as_str()) {
            Some(mut room) => {
                let (hit, keep) = room.connections.drain(..).partition(|c: &Arc<HubConnection>| {
                    c.tracked
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .as_deref()
                        == Some(participant)
                });
                room.connections = keep;
                hit
            }
            None => Vec::new(),
        };

        for conn in victims {
            conn.alive.store(false, Ordering::SeqCst);
            let _ = conn
                .tx
                .send(TransportEvent::Dropped {
                    reason: "transport failure".to_string(),
                })
                .await;
        }
    }

    /// Number of live connections in a scope.
    pub fn connection_count(&self, scope: &ScopeKey) -> usize {
        self.rooms
            .get(scope.as_str())
            .map(|room| room.connections.len())
            .unwrap_or(0)
    }

    /// Fan a change notification out to every connection with a matching
    /// (table, filter) subscription.
    pub(crate) async fn publish_change(
        &self,
        table: &str,
        operation: ChangeOperation,
        record: Value,
    ) {
        let event = ChangeEvent {
            table: table.to_string(),
            operation,
            record,
        };

        // Collect matching senders before awaiting anything.
        let mut targets = Vec::new();
        for room in self.rooms.iter() {
            for conn in &room.connections {
                if conn.matches(table, &event.record) {
                    targets.push(conn.tx.clone());
                }
            }
        }

        debug!(
            table,
            operation = ?event.operation,
            subscribers = targets.len(),
            "Publishing change notification"
        );

        for tx in targets {
            if tx.send(TransportEvent::Change(event.clone())).await.is_err() {
                warn!(table, "Change event receiver dropped");
            }
        }
    }

    /// Publish or refresh a participant's presence payload in a room.
    async fn track(&self, conn: &HubConnection, record: Value) -> AppResult<()> {
        let participant = record
            .get("participant_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::validation("presence payload missing participant_id"))?
            .to_string();

        let (snapshot, peers) = {
            let mut room = self
                .rooms
                .entry(conn.scope.as_str().to_string())
                .or_default();
            room.presence.insert(participant.clone(), record.clone());
            let snapshot = room.presence.clone();
            let peers: Vec<_> = room.connections.iter().map(|c| c.tx.clone()).collect();
            (snapshot, peers)
        };

        *conn.tracked.lock().unwrap_or_else(|e| e.into_inner()) = Some(participant);

        // Join to every room member, authoritative snapshot to the tracker.
        for tx in peers {
            let _ = tx
                .send(TransportEvent::Presence(PresenceEvent::Join(vec![
                    record.clone(),
                ])))
                .await;
        }
        let _ = conn
            .tx
            .send(TransportEvent::Presence(PresenceEvent::Sync(snapshot)))
            .await;

        Ok(())
    }

    /// Withdraw a participant's presence and broadcast the leave.
    async fn untrack(&self, conn: &HubConnection) -> AppResult<()> {
        let participant = conn
            .tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(participant) = participant else {
            return Ok(());
        };

        let peers = {
            let mut room = match self.rooms.get_mut(conn.scope.as_str()) {
                Some(room) => room,
                None => return Ok(()),
            };
            room.presence.remove(&participant);
            room.connections
                .iter()
                .map(|c| c.tx.clone())
                .collect::<Vec<_>>()
        };

        for tx in peers {
            let _ = tx
                .send(TransportEvent::Presence(PresenceEvent::Leave(vec![
                    participant.clone(),
                ])))
                .await;
        }

        Ok(())
    }

    /// Detach a connection from its room, emitting a presence leave when
    /// the participant was tracked.
    async fn close_connection(&self, conn: &HubConnection) {
        if conn.alive.swap(false, Ordering::SeqCst) {
            let _ = self.untrack(conn).await;
            if let Some(mut room) = self.rooms.get_mut(conn.scope.as_str()) {
                room.connections.retain(|c| c.id != conn.id);
            }
        }
    }
}

#[async_trait]
impl RealtimeTransport for MemoryHub {
    async fn connect(
        &self,
        scope: &ScopeKey,
        event_buffer: usize,
    ) -> AppResult<(Arc<dyn TransportConnection>, mpsc::Receiver<TransportEvent>)> {
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::transport("injected connect failure"));
        }

        let (tx, rx) = mpsc::channel(event_buffer.max(1));
        let conn = Arc::new(HubConnection {
            id: self.next_conn_id.fetch_add(1, Ordering::SeqCst),
            scope: scope.clone(),
            hub: self.self_ref.clone(),
            tx,
            subscriptions: Mutex::new(Vec::new()),
            tracked: Mutex::new(None),
            alive: AtomicBool::new(true),
        });

        self.rooms
            .entry(scope.as_str().to_string())
            .or_default()
            .connections
            .push(conn.clone());

        debug!(scope = %scope, conn_id = conn.id, "Hub connection opened");
        Ok((conn as Arc<dyn TransportConnection>, rx))
    }
}

/// One live in-memory connection.
pub struct HubConnection {
    id: u64,
    scope: ScopeKey,
    hub: Weak<MemoryHub>,
    tx: mpsc::Sender<TransportEvent>,
    subscriptions: Mutex<Vec<(String, RecordFilter)>>,
    tracked: Mutex<Option<String>>,
    alive: AtomicBool,
}

impl HubConnection {
    fn matches(&self, table: &str, record: &Value) -> bool {
        self.alive.load(Ordering::SeqCst)
            && self
                .subscriptions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .any(|(t, f)| t == table && f.matches(record))
    }

    fn hub(&self) -> AppResult<Arc<MemoryHub>> {
        self.hub
            .upgrade()
            .ok_or_else(|| AppError::closed("hub has shut down"))
    }
}

#[async_trait]
impl TransportConnection for HubConnection {
    async fn subscribe_changes(&self, table: &str, filter: &RecordFilter) -> AppResult<()> {
        let mut subs = self.subscriptions.lock().unwrap_or_else(|e| e.into_inner());
        let pair = (table.to_string(), filter.clone());
        if !subs.contains(&pair) {
            subs.push(pair);
        }
        Ok(())
    }

    async fn unsubscribe_changes(&self, table: &str, filter: &RecordFilter) -> AppResult<()> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(t, f)| !(t == table && f == filter));
        Ok(())
    }

    async fn track(&self, record: Value) -> AppResult<()> {
        self.hub()?.track(self, record).await
    }

    async fn untrack(&self) -> AppResult<()> {
        self.hub()?.untrack(self).await
    }

    async fn close(&self) {
        if let Ok(hub) = self.hub() {
            hub.close_connection(self).await;
        }
    }
}
