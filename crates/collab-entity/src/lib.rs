//! # collab-entity
//!
//! Domain records for the Catalyst collaboration engine: presence,
//! activity, chat, event registration, and notifications. All records
//! serialize to the JSON shapes exchanged with the backing store.

pub mod activity;
pub mod chat;
pub mod notification;
pub mod presence;
pub mod registration;
pub mod tables;

pub use activity::ActivityEvent;
pub use chat::{ChatMessage, MessageKind};
pub use notification::{Notification, NotificationPriority};
pub use presence::{PresenceRecord, PresenceStatus};
pub use registration::{EventParticipation, RegistrationState};
