//! Channel session management: one reference-counted session per scope,
//! multiplexing change-feed and presence subscriptions with bounded
//! reconnect backoff.

pub mod registry;
pub mod session;
pub mod status;

pub use registry::{ChannelGuard, ChannelRegistry};
pub use session::ChannelSession;
pub use status::ChannelStatus;
