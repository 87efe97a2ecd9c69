//! Storage error types and their mapping into the core error.

use skyspot_core::errors::{DatabaseError, Error};
use thiserror::Error;

/// Errors raised by the SQLite storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(e) => Error::Database(DatabaseError::Query(e.to_string())),
            StorageError::Pool(e) => Error::Database(DatabaseError::Pool(e.to_string())),
            StorageError::Migration(e) => Error::Database(DatabaseError::Migration(e)),
            StorageError::CorruptRow(e) => Error::Database(DatabaseError::Internal(e)),
        }
    }
}
