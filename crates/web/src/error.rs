//! Unified error handling with Sentry integration.
//!
//! `AppError` is returned by the page handlers. The store and update
//! endpoints never return it; they report failures inside the JSON envelope
//! (see [`crate::services::SyncResponse`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{StorageError, SyncError};

/// Application-level error type for the catalog.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Image storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Repository(RepositoryError::NotFound) => Self::NotFound("product".to_string()),
            SyncError::Repository(e) => Self::Database(e),
            SyncError::Storage(StorageError::InvalidUpload(msg)) => Self::BadRequest(msg),
            SyncError::Storage(e) => Self::Storage(e),
            SyncError::Invalid(msg) | SyncError::InvalidFilter(msg) => Self::BadRequest(msg),
            e @ SyncError::ImageNotStored { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl AppError {
    /// Whether this error is the server's fault rather than the caller's.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Database(RepositoryError::Conflict(_) | RepositoryError::NotFound)
            | Self::NotFound(_)
            | Self::BadRequest(_) => false,
            Self::Database(_) | Self::Storage(_) | Self::Internal(_) => true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let status = match &self {
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Report a failure that is being answered inside a JSON envelope.
///
/// Client errors are logged at `warn`; everything else is logged at `error`
/// and captured to Sentry.
pub fn report_sync_failure(err: &SyncError, operation: &'static str) {
    if err.is_client_error() {
        tracing::warn!(operation, error = %err, "Catalog write rejected");
    } else {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            operation,
            error = %err,
            sentry_event_id = %event_id,
            "Catalog write failed"
        );
    }
}
