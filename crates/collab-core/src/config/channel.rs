//! Channel session and reconnect configuration.

use serde::{Deserialize, Serialize};

/// Channel session manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Internal buffer size for transport event channels.
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
    /// Base delay for exponential reconnect backoff, in milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// Ceiling for the reconnect backoff delay, in milliseconds.
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_ms: u64,
    /// Maximum reconnect attempts per outage before the channel goes into
    /// a terminal error state.
    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: default_event_buffer(),
            backoff_base_ms: default_backoff_base(),
            backoff_cap_ms: default_backoff_cap(),
            max_reconnect_attempts: default_max_attempts(),
        }
    }
}

fn default_event_buffer() -> usize {
    256
}

fn default_backoff_base() -> u64 {
    250
}

fn default_backoff_cap() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    6
}
