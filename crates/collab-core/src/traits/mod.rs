//! Collaborator traits implemented by backends.

pub mod store;
pub mod transport;

pub use store::{RecordFilter, RecordStore};
pub use transport::{
    ChangeEvent, ChangeOperation, PresenceEvent, RealtimeTransport, TransportConnection,
    TransportEvent,
};
