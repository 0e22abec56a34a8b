//! Activity feed unit — append-only, most-recent-N view of a workspace's
//! activity stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

use collab_core::result::AppResult;
use collab_core::traits::store::{RecordFilter, RecordStore};
use collab_core::traits::transport::{ChangeEvent, ChangeOperation};
use collab_core::types::{ScopeKey, WorkspaceId};
use collab_entity::activity::ActivityEvent;
use collab_entity::tables;

use crate::channel::status::ChannelStatus;
use crate::coalesce::RequestCoalescer;
use crate::feed::{ChangeFeedListener, FeedSubscription};
use crate::observer::Subscription;

use super::state::{StateCell, UnitState};

/// Per-workspace activity feed controller. The cached list is newest
/// first and capped; activity records are immutable so only inserts are
/// merged incrementally.
pub struct ActivityFeedUnit {
    workspace_id: WorkspaceId,
    store: Arc<dyn RecordStore>,
    coalescer: Arc<RequestCoalescer>,
    max_retained: usize,
    state: StateCell<Vec<ActivityEvent>>,
    refreshing: AtomicBool,
    feed: Mutex<Option<FeedSubscription>>,
    status_sub: Mutex<Option<Subscription>>,
}

impl ActivityFeedUnit {
    /// Attach a unit for a workspace: opens the workspace scope,
    /// subscribes to activity inserts, and performs the initial refresh.
    pub(crate) async fn attach(
        workspace_id: WorkspaceId,
        store: Arc<dyn RecordStore>,
        coalescer: Arc<RequestCoalescer>,
        listener: &ChangeFeedListener,
        max_retained: usize,
    ) -> AppResult<Arc<Self>> {
        let unit = Arc::new(Self {
            workspace_id,
            store,
            coalescer,
            max_retained,
            state: StateCell::new(Vec::new()),
            refreshing: AtomicBool::new(false),
            feed: Mutex::new(None),
            status_sub: Mutex::new(None),
        });

        let scope = ScopeKey::workspace(workspace_id);
        let filter = RecordFilter::new().eq("scope_id", workspace_id.to_string());

        let weak = Arc::downgrade(&unit);
        let feed = listener
            .listen(&scope, tables::ACTIVITIES, filter, move |change| {
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

    /// Current published state (newest first).
    pub fn state(&self) -> UnitState<Vec<ActivityEvent>> {
        self.state.snapshot()
    }

    /// Observe published state changes.
    pub fn subscribe(
        &self,
        cb: impl Fn(&UnitState<Vec<ActivityEvent>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.state.subscribe(cb)
    }

    /// Reconcile the feed with the remote table.
    pub async fn refresh(&self, force: bool) -> AppResult<()> {
        if force {
            self.refreshing.store(true, Ordering::SeqCst);
        } else if self.refreshing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.state.update(|s| s.loading = true);

        let key = format!("refresh:{}:{}", tables::ACTIVITIES, self.workspace_id);
        let store = self.store.clone();
        let workspace_id = self.workspace_id;
        let result = self
            .coalescer
            .batch(&key, move || async move {
                let filter = RecordFilter::new().eq("scope_id", workspace_id.to_string());
                let rows = store.select(tables::ACTIVITIES, &filter).await?;
                Ok(Value::Array(rows))
            })
            .await;

        self.refreshing.store(false, Ordering::SeqCst);

        match result {
            Ok(rows) => {
                let mut events: Vec<ActivityEvent> = rows
                    .as_array()
                    .map(|rows| rows.iter().filter_map(|row| decode_event(row)).collect())
                    .unwrap_or_default();
                events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                events.truncate(self.max_retained);

                self.state.update(|s| {
                    s.data = events;
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

    /// Merge one incremental feed event. Activity records are immutable,
    /// so updates and deletes are ignored.
    fn apply_change(&self, change: &ChangeEvent) {
        if change.operation != ChangeOperation::Insert {
            return;
        }
        let Some(event) = decode_event(&change.record) else {
            return;
        };
        let max = self.max_retained;

        self.state.update(|s| {
            if !s.data.iter().any(|e| e.id == event.id) {
                s.data.insert(0, event.clone());
                s.data.truncate(max);
            }
        });
    }
}

fn decode_event(record: &Value) -> Option<ActivityEvent> {
    match serde_json::from_value(record.clone()) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Dropping malformed activity record");
            None
        }
    }
}
