//! Realtime transport interface: change-notification stream and presence
//! protocol, multiplexed over one connection per scope.
//!
//! Presence payloads cross this seam as opaque JSON objects, the same way
//! change-feed records do; the presence tracker deserializes them into
//! typed records on arrival.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::result::AppResult;
use crate::traits::store::RecordFilter;
use crate::types::ScopeKey;

/// Row-level mutation kind reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    /// A record was inserted.
    Insert,
    /// A record was updated.
    Update,
    /// A record was deleted.
    Delete,
}

/// One row-level mutation notification.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Source table.
    pub table: String,
    /// Mutation kind.
    pub operation: ChangeOperation,
    /// The affected record. For deletes this is the last known state.
    pub record: Value,
}

/// Presence protocol event scoped to one channel.
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    /// Authoritative full snapshot: participant id → presence payload.
    Sync(HashMap<String, Value>),
    /// Participants joined or re-tracked.
    Join(Vec<Value>),
    /// Participant ids that left.
    Leave(Vec<String>),
}

/// Event delivered by a transport connection.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A change-feed notification.
    Change(ChangeEvent),
    /// A presence protocol event.
    Presence(PresenceEvent),
    /// The connection dropped; no further events will arrive on it.
    Dropped {
        /// Human-readable drop reason.
        reason: String,
    },
}

/// Factory for per-scope connections.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a connection for the scope. Events arrive on the returned
    /// receiver in transport order.
    async fn connect(
        &self,
        scope: &ScopeKey,
        event_buffer: usize,
    ) -> AppResult<(
        std::sync::Arc<dyn TransportConnection>,
        mpsc::Receiver<TransportEvent>,
    )>;
}

/// One live connection to a scope.
#[async_trait]
pub trait TransportConnection: Send + Sync {
    /// Subscribe to row-level mutations of a table restricted by filter.
    /// Subscribing twice to the same (table, filter) pair is idempotent.
    async fn subscribe_changes(&self, table: &str, filter: &RecordFilter) -> AppResult<()>;

    /// Remove a previously registered (table, filter) subscription.
    async fn unsubscribe_changes(&self, table: &str, filter: &RecordFilter) -> AppResult<()>;

    /// Publish or update the local participant's presence payload.
    async fn track(&self, record: Value) -> AppResult<()>;

    /// Withdraw the local participant's presence.
    async fn untrack(&self) -> AppResult<()>;

    /// Close the connection.
    async fn close(&self);
}
