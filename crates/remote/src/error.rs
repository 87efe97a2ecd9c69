//! Error types for the remote gateway crate.

use skyspot_core::errors::SyncError;
use thiserror::Error;

/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors raised while talking to the remote service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the remote service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RemoteError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map into the reconciler-facing taxonomy.
    pub fn into_sync_error(self) -> SyncError {
        match self {
            Self::Api { status, message } => match status {
                401 => SyncError::Unauthorized(message),
                // The service reports an ownership mismatch on update/delete
                // as 403; that is a conflict on the row, not a bad credential.
                403 | 409 => SyncError::RemoteConflict(message),
                404 | 406 => SyncError::RemoteNotFound(message),
                _ => SyncError::Transport(format!("HTTP {}: {}", status, message)),
            },
            Self::Http(err) => SyncError::Transport(err.to_string()),
            Self::Json(err) => SyncError::Transport(format!("Malformed response: {}", err)),
            Self::InvalidRequest(message) => SyncError::Transport(message),
        }
    }
}

impl From<RemoteError> for skyspot_core::Error {
    fn from(err: RemoteError) -> Self {
        Self::Sync(err.into_sync_error())
    }
}
