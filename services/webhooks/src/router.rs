use axum::{
    Router,
    routing::{get, post},
};

use hooktrail_core::error::fallback;
use hooktrail_core::health::{healthz, readyz};
use hooktrail_core::middleware::{propagate_request_id_layer, request_id_layer, trace_layer};

use crate::handlers::{
    audit::query_audit_logs,
    events::{get_event, list_events},
    intake::receive_webhook,
    retry::retry_webhook,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz::<AppState>))
        // Provider callbacks
        .route("/webhooks/{provider}", post(receive_webhook))
        // Admin
        .route("/admin/webhooks", get(list_events))
        .route("/admin/webhooks/{id}", get(get_event))
        .route("/admin/webhooks/{id}/retry", post(retry_webhook))
        .route("/admin/audit-logs", get(query_audit_logs))
        .fallback(fallback)
        .layer(propagate_request_id_layer())
        .layer(trace_layer())
        .layer(request_id_layer())
        .with_state(state)
}
