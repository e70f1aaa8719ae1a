use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::{Value, json};

use crate::error::WebhookServiceError;
use crate::infra::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::state::AppState;
use crate::usecase::intake::{
    IngestWebhookInput, IngestWebhookUseCase, SignatureHeaders, process_received,
};

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

// ── POST /webhooks/{provider} ─────────────────────────────────────────────────

/// Providers get `{"received": true}` as soon as the event is stored; the
/// outcome of processing is only visible to administrators.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookServiceError> {
    let usecase = IngestWebhookUseCase {
        events: state.event_repo(),
        secrets: state.webhook_secrets.clone(),
    };
    let event = usecase
        .execute(IngestWebhookInput {
            provider,
            body,
            signature: SignatureHeaders {
                signature: header(&headers, SIGNATURE_HEADER),
                timestamp: header(&headers, TIMESTAMP_HEADER),
            },
        })
        .await?;

    state.tasks.spawn(process_received(
        state.executor(),
        state.processor.clone(),
        event.id,
    ));

    Ok(Json(json!({ "received": true })))
}
