//! Request coalescing for concurrent identical fetches.

pub mod batcher;

pub use batcher::RequestCoalescer;
