//! Sync domain models, service contracts, and the two reconcilers.

mod model;
mod pull_reconciler;
mod push_reconciler;
mod remote_model;
mod service;

pub use model::*;
pub use pull_reconciler::*;
pub use push_reconciler::*;
pub use remote_model::*;
pub use service::*;

#[cfg(test)]
mod tests;
