//! Registration state unit — derived `{is_registered, participant_count}`
//! view for one event, reconciled against remote participation records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use collab_core::result::AppResult;
use collab_core::traits::store::{RecordFilter, RecordStore};
use collab_core::types::{EventId, ParticipantId, ScopeKey};
use collab_entity::registration::{EventParticipation, RegistrationState};
use collab_entity::tables;

use crate::channel::status::ChannelStatus;
use crate::coalesce::RequestCoalescer;
use crate::feed::{ChangeFeedListener, FeedSubscription};
use crate::observer::Subscription;

use super::state::{StateCell, UnitState};

/// Per-event registration controller.
///
/// `register`/`cancel` apply an optimistic loading flag, write remotely,
/// and leave the authoritative data update to the change-feed-triggered
/// refresh. Failed writes revert the flag and surface the error.
pub struct RegistrationUnit {
    event_id: EventId,
    participant_id: ParticipantId,
    store: Arc<dyn RecordStore>,
    coalescer: Arc<RequestCoalescer>,
    state: StateCell<RegistrationState>,
    refreshing: AtomicBool,
    feed: Mutex<Option<FeedSubscription>>,
    status_sub: Mutex<Option<Subscription>>,
}

impl RegistrationUnit {
    /// Attach a unit for (event, participant): opens the event channel,
    /// subscribes to participation changes, and performs the initial
    /// refresh.
    pub(crate) async fn attach(
        event_id: EventId,
        participant_id: ParticipantId,
        store: Arc<dyn RecordStore>,
        coalescer: Arc<RequestCoalescer>,
        listener: &ChangeFeedListener,
    ) -> AppResult<Arc<Self>> {
        let unit = Arc::new(Self {
            event_id,
            participant_id,
            store,
            coalescer,
            state: StateCell::new(RegistrationState::default()),
            refreshing: AtomicBool::new(false),
            feed: Mutex::new(None),
            status_sub: Mutex::new(None),
        });

        let scope = ScopeKey::event(event_id);
        let filter = RecordFilter::new().eq("event_id", event_id.to_string());

        let weak = Arc::downgrade(&unit);
        let feed = listener
            .listen(&scope, tables::EVENT_PARTICIPANTS, filter, move |_change| {
                if let Some(unit) = weak.upgrade() {
                    tokio::spawn(async move {
                        let _ = unit.refresh(true).await;
                    });
                }
            })
            .await?;

        // Replayed events are not guaranteed across a reconnect; refresh
        // fully whenever the channel comes back.
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

    /// Current published state.
    pub fn state(&self) -> UnitState<RegistrationState> {
        self.state.snapshot()
    }

    /// Observe published state changes.
    pub fn subscribe(
        &self,
        cb: impl Fn(&UnitState<RegistrationState>) + Send + Sync + 'static,
    ) -> Subscription {
        self.state.subscribe(cb)
    }

    /// Reconcile with the remote participation records. Without `force`,
    /// a refresh already in flight for this unit is skipped.
    pub async fn refresh(&self, force: bool) -> AppResult<()> {
        if force {
            self.refreshing.store(true, Ordering::SeqCst);
        } else if self.refreshing.swap(true, Ordering::SeqCst) {
            debug!(event = %self.event_id, "Refresh already in flight, skipping");
            return Ok(());
        }

        self.state.update(|s| s.loading = true);

        let key = format!("refresh:{}:{}", tables::EVENT_PARTICIPANTS, self.event_id);
        let store = self.store.clone();
        let event_id = self.event_id;
        let result = self
            .coalescer
            .batch(&key, move || async move {
                let filter = RecordFilter::new().eq("event_id", event_id.to_string());
                let rows = store.select(tables::EVENT_PARTICIPANTS, &filter).await?;
                Ok(Value::Array(rows))
            })
            .await;

        self.refreshing.store(false, Ordering::SeqCst);

        match result {
            Ok(rows) => {
                let rows = rows.as_array().cloned().unwrap_or_default();
                let mine = Value::String(self.participant_id.to_string());
                let participation: Option<EventParticipation> = rows
                    .iter()
                    .find(|row| row.get("participant_id") == Some(&mine))
                    .and_then(|row| serde_json::from_value(row.clone()).ok());

                self.state.update(|s| {
                    s.data = RegistrationState {
                        is_registered: participation.is_some(),
                        participant_count: rows.len(),
                        participation,
                    };
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

    /// Register the local participant for the event. Concurrent calls
    /// from the same unit identity coalesce into one remote insert.
    pub async fn register(&self) -> AppResult<()> {
        if self.state.snapshot().data.is_registered {
            return Ok(());
        }

        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let key = format!("register:{}:{}", self.event_id, self.participant_id);
        let store = self.store.clone();
        let participation = EventParticipation::new(self.event_id, self.participant_id);
        let result = self
            .coalescer
            .batch(&key, move || async move {
                store
                    .insert(tables::EVENT_PARTICIPANTS, serde_json::to_value(&participation)?)
                    .await
            })
            .await;

        self.finish_mutation(result.map(|_| ()))
    }

    /// Cancel the local participant's registration.
    pub async fn cancel(&self) -> AppResult<()> {
        let Some(participation) = self.state.snapshot().data.participation else {
            return Ok(());
        };

        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let key = format!("cancel:{}:{}", self.event_id, self.participant_id);
        let store = self.store.clone();
        let record_id = participation.id.to_string();
        let result = self
            .coalescer
            .batch(&key, move || async move {
                store.delete(tables::EVENT_PARTICIPANTS, &record_id).await?;
                Ok(Value::Null)
            })
            .await;

        self.finish_mutation(result.map(|_| ()))
    }

    /// Common mutation epilogue: on success the authoritative data
    /// arrives through the feed-triggered refresh; on failure the
    /// optimistic flag is reverted and the error surfaced.
    fn finish_mutation(&self, result: AppResult<()>) -> AppResult<()> {
        match result {
            Ok(()) => {
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
}
