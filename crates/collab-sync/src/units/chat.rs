//! Chat unit — ordered, deduplicated message cache for one channel with
//! send/edit/soft-delete mutations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use collab_core::result::AppResult;
use collab_core::traits::store::{RecordFilter, RecordStore};
use collab_core::traits::transport::{ChangeEvent, ChangeOperation};
use collab_core::types::{MessageId, ParticipantId, ScopeKey};
use collab_entity::chat::{ChatMessage, MessageKind};
use collab_entity::tables;

use crate::channel::status::ChannelStatus;
use crate::coalesce::RequestCoalescer;
use crate::feed::{ChangeFeedListener, FeedSubscription};
use crate::observer::Subscription;

use super::state::{StateCell, UnitState};

/// Per-channel chat controller.
///
/// The cached list is ordered by creation time and deduplicated by
/// message id. Incremental feed events merge in place; a full refresh
/// replaces the list, so detach/re-attach cycles cannot introduce
/// duplicates. Deleted messages stay cached with their soft-delete flag.
pub struct ChatUnit {
    channel: String,
    sender_id: ParticipantId,
    store: Arc<dyn RecordStore>,
    coalescer: Arc<RequestCoalescer>,
    max_cached: usize,
    state: StateCell<Vec<ChatMessage>>,
    refreshing: AtomicBool,
    feed: Mutex<Option<FeedSubscription>>,
    status_sub: Mutex<Option<Subscription>>,
}

impl ChatUnit {
    /// Attach a unit for a channel: opens the chat scope, subscribes to
    /// message changes, and performs the initial refresh.
    pub(crate) async fn attach(
        channel: &str,
        sender_id: ParticipantId,
        store: Arc<dyn RecordStore>,
        coalescer: Arc<RequestCoalescer>,
        listener: &ChangeFeedListener,
        max_cached: usize,
    ) -> AppResult<Arc<Self>> {
        let unit = Arc::new(Self {
            channel: channel.to_string(),
            sender_id,
            store,
            coalescer,
            max_cached,
            state: StateCell::new(Vec::new()),
            refreshing: AtomicBool::new(false),
            feed: Mutex::new(None),
            status_sub: Mutex::new(None),
        });

        let scope = ScopeKey::chat(channel);
        let filter = RecordFilter::new().eq("channel", channel);

        let weak = Arc::downgrade(&unit);
        let feed = listener
            .listen(&scope, tables::CHAT_MESSAGES, filter, move |change| {
                if let Some(unit) = weak.upgrade() {
                    unit.apply_change(change);
                }
            })
            .await?;

        let weak = Arc::downgrade(&unit);
        let previous = Mutex::new(feed.session().status());
        let status_sub = feed.session().subscribe_status(move |status| {
            let reconnected = {
                let mut previous = previous.lock().unwrap_or_else(|e| e.into_inner());
                let was = *previous;
                *previous = *status;
                was == ChannelStatus::Reconnecting && *status == ChannelStatus::Subscribed
            };
            if reconnected {
                if let Some(unit) = weak.upgrade() {
                    tokio::spawn(async move {
                        let _ = unit.refresh(true).await;
                    });
                }
            }
        });

        *unit.feed.lock().unwrap_or_else(|e| e.into_inner()) = Some(feed);
        *unit.status_sub.lock().unwrap_or_else(|e| e.into_inner()) = Some(status_sub);

        unit.refresh(false).await?;
        Ok(unit)
    }

    /// Current published state (all cached messages, deleted included).
    pub fn state(&self) -> UnitState<Vec<ChatMessage>> {
        self.state.snapshot()
    }

    /// Messages visible to the UI: soft-deleted ones are hidden.
    pub fn visible_messages(&self) -> Vec<ChatMessage> {
        self.state
            .snapshot()
            .data
            .into_iter()
            .filter(|m| !m.deleted)
            .collect()
    }

    /// Observe published state changes.
    pub fn subscribe(
        &self,
        cb: impl Fn(&UnitState<Vec<ChatMessage>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.state.subscribe(cb)
    }

    /// Reconcile the full message list with the remote table.
    pub async fn refresh(&self, force: bool) -> AppResult<()> {
        if force {
            self.refreshing.store(true, Ordering::SeqCst);
        } else if self.refreshing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.state.update(|s| s.loading = true);

        let key = format!("refresh:{}:{}", tables::CHAT_MESSAGES, self.channel);
        let store = self.store.clone();
        let channel = self.channel.clone();
        let result = self
            .coalescer
            .batch(&key, move || async move {
                let filter = RecordFilter::new().eq("channel", channel.as_str());
                let rows = store.select(tables::CHAT_MESSAGES, &filter).await?;
                Ok(Value::Array(rows))
            })
            .await;

        self.refreshing.store(false, Ordering::SeqCst);

        match result {
            Ok(rows) => {
                let mut messages: Vec<ChatMessage> = rows
                    .as_array()
                    .map(|rows| {
                        rows.iter()
                            .filter_map(|row| decode_message(row))
                            .collect()
                    })
                    .unwrap_or_default();
                messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                let max = self.max_cached;

                self.state.update(|s| {
                    s.data = messages;
                    trim_oldest(&mut s.data, max);
                    s.loading = false;
                    s.error = None;
                });
                Ok(())
            }
            Err(e) => {
                self.state.update(|s| {
                    s.loading = false;
                    s.error = Some(e.clone());
                });
                Err(e)
            }
        }
    }

    /// Send a message to the channel. The cached copy arrives through
    /// the change feed; failures revert the loading flag and surface the
    /// error with no automatic retry.
    pub async fn send(
        &self,
        content: &str,
        kind: MessageKind,
        reply_to: Option<MessageId>,
    ) -> AppResult<ChatMessage> {
        let mut message = ChatMessage::text(self.sender_id, &self.channel, content);
        message.message_type = kind;
        message.reply_to = reply_to;

        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self
            .store
            .insert(tables::CHAT_MESSAGES, serde_json::to_value(&message)?)
            .await;

        match result {
            Ok(_) => {
                self.state.update(|s| s.loading = false);
                Ok(message)
            }
            Err(e) => {
                self.state.update(|s| {
                    s.loading = false;
                    s.error = Some(e.clone());
                });
                Err(e)
            }
        }
    }

    /// Edit a message's content; stamps `edited_at`.
    pub async fn edit(&self, id: MessageId, content: &str) -> AppResult<()> {
        let patch = json!({
            "content": content,
            "edited_at": Utc::now(),
        });
        self.mutate_message(id, patch).await
    }

    /// Soft-delete a message. The cached entry is retained with its
    /// delete flag set.
    pub async fn remove(&self, id: MessageId) -> AppResult<()> {
        self.mutate_message(id, json!({"deleted": true})).await
    }

    async fn mutate_message(&self, id: MessageId, patch: Value) -> AppResult<()> {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self
            .store
            .update(tables::CHAT_MESSAGES, &id.to_string(), patch)
            .await;

        match result {
            Ok(_) => {
                self.state.update(|s| s.loading = false);
                Ok(())
            }
            Err(e) => {
                self.state.update(|s| {
                    s.loading = false;
                    s.error = Some(e.clone());
                });
                Err(e)
            }
        }
    }

    /// Merge one incremental feed event into the cache.
    fn apply_change(&self, change: &ChangeEvent) {
        let Some(message) = decode_message(&change.record) else {
            return;
        };
        let max = self.max_cached;

        self.state.update(|s| match change.operation {
            ChangeOperation::Insert => {
                if !s.data.iter().any(|m| m.id == message.id) {
                    s.data.push(message.clone());
                    s.data.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                    trim_oldest(&mut s.data, max);
                }
            }
            ChangeOperation::Update => {
                match s.data.iter_mut().find(|m| m.id == message.id) {
                    Some(existing) => *existing = message.clone(),
                    None => {
                        s.data.push(message.clone());
                        s.data.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                        trim_oldest(&mut s.data, max);
                    }
                }
            }
            // Remote hard-deletes become local soft-deletes; the cache
            // view never drops a message it has shown.
            ChangeOperation::Delete => {
                if let Some(existing) = s.data.iter_mut().find(|m| m.id == message.id) {
                    existing.deleted = true;
                }
            }
        });
    }
}

fn decode_message(record: &Value) -> Option<ChatMessage> {
    match serde_json::from_value(record.clone()) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, "Dropping malformed chat message record");
            None
        }
    }
}

/// Keep the newest `max` entries of a list ordered oldest→newest.
fn trim_oldest(messages: &mut Vec<ChatMessage>, max: usize) {
    if messages.len() > max {
        let excess = messages.len() - max;
        messages.drain(..excess);
    }
}
