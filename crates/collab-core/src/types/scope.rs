//! Scope-key builders for collaboration channels.
//!
//! A scope key groups all subscriptions relevant to one collaboration
//! context onto a single logical channel. Centralising key construction
//! prevents typos and makes it easy to find every scope the engine uses.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{EventId, WorkspaceId};

/// Identifier of one logical pub/sub channel scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Scope for a whole workspace (activity feed, presence).
    pub fn workspace(id: WorkspaceId) -> Self {
        Self(format!("workspace:{id}"))
    }

    /// Scope for a single innovation event (registrations).
    pub fn event(id: EventId) -> Self {
        Self(format!("event:{id}"))
    }

    /// Scope for a named chat channel.
    pub fn chat(channel: &str) -> Self {
        Self(format!("chat:{channel}"))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
