//! Request builders and response readers for router tests.

use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request};
use axum::response::Response;
use serde_json::Value;

/// Build a request with the given headers and raw body.
pub fn request(
    method: Method,
    uri: &str,
    headers: &HeaderMap,
    body: impl Into<Body>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder.body(body.into()).unwrap()
}

/// Build a JSON request (`content-type: application/json`).
pub fn json_request(
    method: Method,
    uri: &str,
    headers: &HeaderMap,
    body: &Value,
) -> Request<Body> {
    let mut headers = headers.clone();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("application/json"),
    );
    request(method, uri, &headers, body.to_string())
}

/// Read a response body as JSON. Panics on invalid JSON.
pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
