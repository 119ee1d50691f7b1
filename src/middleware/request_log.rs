use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use crate::config;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Times every request, tags the response with a request id and the elapsed
/// seconds, and logs both ends when request logging is enabled.
pub async fn request_log_middleware(request: Request, next: Next) -> Response {
    let enabled = config::config().api.enable_request_logging;
    let started = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if enabled {
        info!("Request: {} {} [{}]", method, path, request_id);
    }

    let mut response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    if enabled {
        info!(
            "Response: {} {} - Status: {} - Time: {:.4}s",
            method,
            path,
            response.status().as_u16(),
            elapsed
        );
    }

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed)) {
        headers.insert(HeaderName::from_static(PROCESS_TIME_HEADER), value);
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}
