//! Presence heartbeat and staleness configuration.

use serde::{Deserialize, Serialize};

/// Presence tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Interval between local heartbeat re-tracks, in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Age after which a presence record no longer counts as online,
    /// in seconds. Must exceed the heartbeat interval.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            stale_after_seconds: default_stale_after(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    15
}

fn default_stale_after() -> u64 {
    45
}
