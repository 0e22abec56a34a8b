//! Change-feed listener — subscribes to row-level mutations for a table
//! restricted by filter, scoped to one channel.
//!
//! Delivery is at-least-once while the channel is connected, ordered
//! within one filtered stream. Missed events are not replayed across a
//! reconnect; owning units refresh fully when the session transitions
//! back to `Subscribed`.

use std::sync::Arc;

use collab_core::result::AppResult;
use collab_core::traits::store::RecordFilter;
use collab_core::traits::transport::ChangeEvent;
use collab_core::types::ScopeKey;

use crate::channel::registry::{ChannelGuard, ChannelRegistry};
use crate::channel::session::ChannelSession;

/// Opens feed subscriptions on shared channel sessions.
pub struct ChangeFeedListener {
    registry: Arc<ChannelRegistry>,
}

impl ChangeFeedListener {
    /// Creates a listener over the registry.
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// Subscribe `handler` to mutations of `table` matching `filter`,
    /// multiplexed onto the channel for `scope`. The handler runs
    /// synchronously with event dispatch; spawn for any async work.
    pub async fn listen(
        &self,
        scope: &ScopeKey,
        table: &str,
        filter: RecordFilter,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> AppResult<FeedSubscription> {
        let guard = self.registry.open(scope);
        let feed_id = guard
            .session()
            .add_feed(table, filter, Arc::new(handler))
            .await?;
        Ok(FeedSubscription { guard, feed_id })
    }
}

/// Active feed registration. Dropping it removes the registration and
/// releases the channel reference.
pub struct FeedSubscription {
    guard: ChannelGuard,
    feed_id: u64,
}

impl FeedSubscription {
    /// The channel session the subscription is multiplexed on.
    pub fn session(&self) -> &Arc<ChannelSession> {
        self.guard.session()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        let session = self.guard.session().clone();
        let feed_id = self.feed_id;
        // Registration cleanup needs the async transport; detach it. When
        // the runtime is already gone the session is being torn down too.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                session.remove_feed(feed_id).await;
            });
        }
    }
}
