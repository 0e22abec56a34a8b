//! Change-feed subscriptions over channel sessions.

pub mod listener;

pub use listener::{ChangeFeedListener, FeedSubscription};
