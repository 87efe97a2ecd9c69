//! Skyspot core: domain models, error types, service contracts, and the
//! bidirectional sync reconcilers.

pub mod errors;
pub mod spots;
pub mod sync;

pub use errors::{Error, Result};
