//! Presence tracking: per-scope participant maps fed by the presence
//! protocol, with heartbeat emission and staleness handling.

pub mod heartbeat;
pub mod tracker;

pub use heartbeat::{Heartbeat, Visibility};
pub use tracker::{PresenceTracker, ScopePresence};
