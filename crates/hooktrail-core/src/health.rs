#![allow(async_fn_in_trait)]

use axum::extract::State;
use axum::http::StatusCode;

/// Implemented by service state that can report whether its backing stores are reachable.
pub trait Readiness: Clone + Send + Sync + 'static {
    async fn is_ready(&self) -> bool;
}

/// Handler for `GET /healthz`. Liveness only, never touches dependencies.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Handler for `GET /readyz`: 503 while the service's stores are unreachable.
pub async fn readyz<S: Readiness>(State(state): State<S>) -> StatusCode {
    if state.is_ready().await {
        StatusCode::OK
    } else {
        tracing::warn!("readiness probe failed");
        StatusCode::SERVICE_UNAVAILABLE
    }
}
