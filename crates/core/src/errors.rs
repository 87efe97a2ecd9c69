//! Error types shared across the Skyspot crates.

use thiserror::Error;

/// Result type alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Database-level failures surfaced by the storage crate.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection pool exhausted or unavailable.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Query execution failure.
    #[error("Query error: {0}")]
    Query(String),

    /// Migration failure at startup.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Anything else the storage layer cannot classify.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Sync-pass failures, classified per the reconciler propagation policy:
/// pass-fatal errors abort the whole pass, item-level errors are accumulated
/// into the report and never interrupt sibling items.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No current user identity. Fatal to the whole pass.
    #[error("Not authenticated: no current user")]
    NotAuthenticated,

    /// Network/timeout failure. Retryable by a later pass.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Missing or invalid credentials rejected by the remote service.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Remote record not found.
    #[error("Remote record not found: {0}")]
    RemoteNotFound(String),

    /// Ownership mismatch on a remote update/delete. Fatal to that item only.
    #[error("Remote conflict: {0}")]
    RemoteConflict(String),

    /// Cached bytes for a media item are gone. Fatal to that item only.
    #[error("Image not found in cache: {0}")]
    ImageNotFoundInCache(String),

    /// Asset exceeds the configured upload ceiling.
    #[error("Asset too large: {size} bytes (limit {limit})")]
    AssetTooLarge { size: usize, limit: usize },

    /// Asset bytes are empty or undecodable.
    #[error("Asset unreadable: {0}")]
    AssetUnreadable(String),

    /// Another invocation of the same reconciler is still running.
    #[error("Sync already in progress")]
    AlreadySyncing,
}

impl SyncError {
    /// Item-level errors are collected into the report; everything else
    /// aborts the pass.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Self::RemoteConflict(_)
                | Self::RemoteNotFound(_)
                | Self::ImageNotFoundInCache(_)
                | Self::AssetTooLarge { .. }
                | Self::AssetUnreadable(_)
                | Self::Transport(_)
        )
    }
}

/// Top-level error for the core crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The sync classification when this wraps a sync failure.
    pub fn as_sync(&self) -> Option<&SyncError> {
        match self {
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this failure should be recorded against a single item rather
    /// than aborting the pass.
    pub fn is_item_level(&self) -> bool {
        self.as_sync().is_some_and(SyncError::is_item_level)
    }
}
