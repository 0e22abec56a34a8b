//! # collab-store
//!
//! In-memory backend for the Catalyst collaboration engine. Provides:
//!
//! - [`MemoryStore`] — tables of JSON records with change propagation
//! - [`MemoryHub`] — per-scope connections, change-feed routing, and
//!   presence rooms, plus fault-injection hooks for tests
//!
//! A remote backend implements the same `collab-core` traits; this one
//! backs the test suite and the demo daemon.

pub mod memory;

pub use memory::hub::MemoryHub;
pub use memory::store::MemoryStore;
