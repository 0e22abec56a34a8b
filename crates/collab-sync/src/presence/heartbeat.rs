//! Periodic presence heartbeat for the local participant.
//!
//! Re-tracks the local record on an interval and on visibility changes
//! so `last_seen` stays fresh; peers treat a missing heartbeat as
//! implicit offline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use collab_entity::presence::{PresenceRecord, PresenceStatus};

use super::tracker::ScopePresence;

/// Client visibility state reported by the UI host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Application tab/window is in the foreground.
    Foreground,
    /// Application is backgrounded.
    Background,
}

/// Running heartbeat for one scope. Stops when dropped.
pub struct Heartbeat {
    shutdown: CancellationToken,
    visibility: watch::Sender<Visibility>,
}

impl Heartbeat {
    /// Start heartbeating `record` into the scope at `interval`.
    ///
    /// The record's initial status is kept while foregrounded; while
    /// backgrounded the published status degrades to `Away`.
    pub fn start(presence: Arc<ScopePresence>, record: PresenceRecord, interval: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let (visibility_tx, visibility_rx) = watch::channel(Visibility::Foreground);

        let token = shutdown.clone();
        tokio::spawn(run_heartbeat(presence, record, interval, token, visibility_rx));

        Self {
            shutdown,
            visibility: visibility_tx,
        }
    }

    /// Report a visibility change; re-tracks immediately.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.send_replace(visibility);
    }

    /// Stop the heartbeat.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_heartbeat(
    presence: Arc<ScopePresence>,
    base: PresenceRecord,
    interval: Duration,
    shutdown: CancellationToken,
    mut visibility: watch::Receiver<Visibility>,
) {
    let foreground_status = base.status;
    let mut record = base;
    let mut ticker = time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
            changed = visibility.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        record.status = match *visibility.borrow() {
            Visibility::Foreground => foreground_status,
            Visibility::Background => PresenceStatus::Away,
        };
        record.last_seen = Utc::now();

        if let Err(e) = presence.track(&record).await {
            warn!(error = %e, "Heartbeat track failed");
        }
    }

    debug!(participant = %record.participant_id, "Heartbeat stopped");
}
