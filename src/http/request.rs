//! Request identification and body detection.
//!
//! # Responsibilities
//! - Generate a UUID v4 `x-request-id` when the client sent none
//! - Read the request ID back for logging
//! - Decide whether an inbound request carries a body worth forwarding

use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates request IDs as UUID v4 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of an inbound request, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// True when the inbound request has a body to stream upstream.
///
/// Bodiless requests are sent without one so GET/HEAD never go out chunked.
pub fn carries_body(headers: &HeaderMap, body: &Body) -> bool {
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return true;
    }
    if let Some(length) = headers.get(header::CONTENT_LENGTH) {
        return length.as_bytes() != b"0";
    }
    !body.is_end_stream()
}
