//! Channel connection status.

use serde::{Deserialize, Serialize};

/// Connection status of one channel session.
///
/// Transitions: `Disconnected → Connecting → Subscribed`;
/// `Subscribed → Reconnecting` on transport drop; `Reconnecting →
/// Subscribed` on success or `→ Error` once the retry budget is spent;
/// any state `→ Closed` on explicit close. `Error` and `Closed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// No connection attempt has started yet.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Live and receiving events.
    Subscribed,
    /// Connection dropped; backoff retries in progress.
    Reconnecting,
    /// Retry budget exhausted. Consumers own user-visible messaging.
    Error,
    /// Explicitly closed by the last consumer.
    Closed,
}

impl ChannelStatus {
    /// Converts to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
            Self::Closed => "closed",
        }
    }

    /// Whether no further transitions can happen except `Closed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ChannelStatus::Error.is_terminal());
        assert!(ChannelStatus::Closed.is_terminal());
        assert!(!ChannelStatus::Reconnecting.is_terminal());
    }
}
