use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::domain::types::InvalidTransition;

/// Webhooks service error variants.
#[derive(Debug, thiserror::Error)]
pub enum WebhookServiceError {
    #[error("Event not found")]
    EventNotFound,
    #[error("unknown provider")]
    UnknownProvider,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("missing event type")]
    MissingEventType,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Max retries reached ({max})")]
    AttemptLimitExceeded { max: u32 },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("Attempt already closed")]
    AttemptClosed,
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl WebhookServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EventNotFound => "EVENT_NOT_FOUND",
            Self::UnknownProvider => "UNKNOWN_PROVIDER",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::MissingEventType => "MISSING_EVENT_TYPE",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::AttemptLimitExceeded { .. } => "ATTEMPT_LIMIT_EXCEEDED",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::AttemptClosed => "ATTEMPT_CLOSED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::EventNotFound => StatusCode::NOT_FOUND,
            Self::UnknownProvider
            | Self::InvalidPayload(_)
            | Self::MissingEventType
            | Self::InvalidFilter(_)
            | Self::AttemptLimitExceeded { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::InvalidTransition(_) | Self::AttemptClosed => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Attach `Retry-After` (seconds) to a response.
pub fn with_retry_after(mut response: Response, retry_after_secs: u64) -> Response {
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

impl IntoResponse for WebhookServiceError {
    fn into_response(self) -> Response {
        // 500s only: TraceLayer already records method/uri/status for every request.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        let response = (self.status(), axum::Json(body)).into_response();
        match self {
            Self::RateLimited { retry_after_secs } => with_retry_after(response, retry_after_secs),
            _ => response,
        }
    }
}
