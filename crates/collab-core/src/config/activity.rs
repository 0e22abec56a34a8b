//! Activity feed retention configuration.

use serde::{Deserialize, Serialize};

/// Activity feed unit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Maximum activity events retained per workspace feed. Oldest
    /// evicted first.
    #[serde(default = "default_max_retained")]
    pub max_retained_events: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            max_retained_events: default_max_retained(),
        }
    }
}

fn default_max_retained() -> usize {
    100
}
