//! # collab-core
//!
//! Core crate for the Catalyst collaboration engine. Contains the
//! collaborator traits, configuration schemas, typed identifiers,
//! scope-key builders, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Catalyst crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
