use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use hooktrail_auth_types::identity::AdminIdentity;
use hooktrail_core::client::ClientInfo;
use hooktrail_domain::id::EventId;

use crate::error::{WebhookServiceError, with_retry_after};
use crate::handlers::rate_limit_headers;
use crate::state::AppState;
use crate::usecase::retry::{
    RetryOutcome, RetryRejection, RetryReport, RetryRequest, RetryWebhookUseCase,
};

// ── POST /admin/webhooks/{id}/retry ───────────────────────────────────────────

pub async fn retry_webhook(
    State(state): State<AppState>,
    AdminIdentity(actor): AdminIdentity,
    client: ClientInfo,
    Path(event_id): Path<EventId>,
) -> Result<Response, WebhookServiceError> {
    let usecase = RetryWebhookUseCase {
        executor: state.executor(),
        limiter: state.limiter.clone(),
        processor: state.processor.clone(),
        policy: state.retry_policy,
    };
    let report = usecase
        .execute(RetryRequest {
            event_id,
            actor,
            client,
        })
        .await?;
    Ok(retry_response(report))
}

/// `{"success": true, "attemptNumber": n}` or `{"kind", "error"}`.
pub fn retry_response(report: RetryReport) -> Response {
    let headers = rate_limit_headers(&report.rate_limit);
    match report.outcome {
        RetryOutcome::Succeeded { attempt_number } => (
            StatusCode::OK,
            headers,
            Json(json!({ "success": true, "attemptNumber": attempt_number })),
        )
            .into_response(),
        RetryOutcome::Failed {
            attempt_number,
            error,
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            headers,
            Json(json!({
                "kind": "PROCESSING_FAILED",
                "error": error,
                "attemptNumber": attempt_number,
            })),
        )
            .into_response(),
        RetryOutcome::Rejected(rejection) => {
            let response = (
                rejection.status(),
                headers,
                Json(json!({ "kind": rejection.kind(), "error": rejection.message() })),
            )
                .into_response();
            match rejection {
                RetryRejection::RateLimited { retry_after_secs } => {
                    with_retry_after(response, retry_after_secs)
                }
                _ => response,
            }
        }
    }
}
