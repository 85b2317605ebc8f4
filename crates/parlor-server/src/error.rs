//! HTTP-facing error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parlor_messaging::MessagingError;
use parlor_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by handlers and background jobs.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Messaging lifecycle or dispatch failure.
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request payload or path is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The requested resource kind does not exist.
    #[error("unknown record kind: {0}")]
    UnknownResource(String),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    /// Short machine-readable kind for the error envelope.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Messaging(e) => match e {
                MessagingError::AlreadyInProgress => "already_in_progress",
                MessagingError::InitializationError { .. } => "initialization_error",
                MessagingError::AuthenticationFailed { .. } => "authentication_failed",
                MessagingError::NotReady { .. } => "not_ready",
                MessagingError::InvalidRecipient { .. } => "invalid_recipient",
                MessagingError::UnregisteredRecipient { .. } => "unregistered_recipient",
                MessagingError::DispatchError { .. } => "dispatch_error",
            },
            Self::Store(e) => match e {
                StoreError::NotFound { .. } => "not_found",
                StoreError::Io(_) | StoreError::Serde(_) => "store_error",
            },
            Self::BadRequest(_) => "bad_request",
            Self::UnknownResource(_) => "unknown_resource",
            Self::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Messaging(e) => match e {
                MessagingError::AlreadyInProgress | MessagingError::NotReady { .. } => {
                    StatusCode::CONFLICT
                }
                MessagingError::InvalidRecipient { .. } => StatusCode::BAD_REQUEST,
                MessagingError::UnregisteredRecipient { .. } => StatusCode::NOT_FOUND,
                MessagingError::InitializationError { .. }
                | MessagingError::AuthenticationFailed { .. }
                | MessagingError::DispatchError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(StoreError::NotFound { .. }) | Self::UnknownResource(_) => {
                StatusCode::NOT_FOUND
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}
