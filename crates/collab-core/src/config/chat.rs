//! Chat cache configuration.

use serde::{Deserialize, Serialize};

/// Chat unit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum messages cached locally per channel. Oldest evicted first.
    #[serde(default = "default_max_cached")]
    pub max_cached_messages: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_cached_messages: default_max_cached(),
        }
    }
}

fn default_max_cached() -> usize {
    200
}
