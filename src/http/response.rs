//! Error responses.
//!
//! # Responsibilities
//! - Map handler and gate failures to HTTP status codes
//! - Render every failure as `{"error": "<message>"}`
//! - Keep internal detail out of 500 bodies; log it instead

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::UserError;
use crate::chat::ChatError;
use crate::media::MediaError;

const INTERNAL_MESSAGE: &str = "Internal server error.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Too many requests.")]
    RateLimited { retry_after: Duration },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::Media(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidUsername => ApiError::BadRequest(err.to_string()),
            UserError::UsernameTaken | UserError::EmailTaken => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ConversationNotFound | ChatError::MessageNotFound | ChatError::NotParticipant => {
                ApiError::NotFound(err.to_string())
            }
            ChatError::AlreadyParticipant => ApiError::Conflict(err.to_string()),
            ChatError::LastParticipant => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Storage(_) | ApiError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let ApiError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
        }
        response
    }
}

/// Whole seconds, rounded up, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}
