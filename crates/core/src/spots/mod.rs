//! Spot domain models and the local store adapter contract.

mod model;
mod repository;

pub use model::*;
pub use repository::*;
