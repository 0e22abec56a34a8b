//! # collab-sync
//!
//! Real-time collaboration and state-synchronization engine for the
//! Catalyst portal. Provides:
//!
//! - Reference-counted channel sessions with bounded reconnect backoff
//! - Presence tracking with heartbeat and staleness handling
//! - Change-feed listeners over table+filter subscriptions
//! - Request coalescing for concurrent identical fetches
//! - Entity state units (registration, chat, activity feed) publishing
//!   `{data, loading, error}` snapshots
//! - A typed, prioritized, bounded notification inbox

pub mod channel;
pub mod coalesce;
pub mod context;
pub mod feed;
pub mod metrics;
pub mod notify;
pub mod observer;
pub mod presence;
pub mod units;

pub use channel::registry::{ChannelGuard, ChannelRegistry};
pub use channel::status::ChannelStatus;
pub use coalesce::RequestCoalescer;
pub use context::SyncContext;
pub use feed::ChangeFeedListener;
pub use metrics::EngineMetrics;
pub use notify::NotificationAggregator;
pub use presence::{Heartbeat, PresenceTracker, Visibility};
pub use units::{ActivityFeedUnit, ChatUnit, RegistrationUnit, UnitState};
