//! Notification inbox configuration.

use serde::{Deserialize, Serialize};

/// Notification aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Maximum non-archived notifications retained. Oldest non-archived
    /// evicted first.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
    /// Optional auto-mark-as-read dwell time in seconds. When set, all
    /// listed notifications are marked read after this quiet period with
    /// no archive/clear action. Disabled when absent.
    #[serde(default)]
    pub auto_mark_read_after_seconds: Option<u64>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
            auto_mark_read_after_seconds: None,
        }
    }
}

fn default_max_retained() -> usize {
    50
}
