//! Entity state units: per-feature controllers owning a local cache,
//! applying optimistic mutations, and reconciling with the change feed.

pub mod activity;
pub mod chat;
pub mod registration;
pub mod state;

pub use activity::ActivityFeedUnit;
pub use chat::ChatUnit;
pub use registration::RegistrationUnit;
pub use state::{StateCell, UnitState};
