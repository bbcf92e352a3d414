//! Request ids and header masking
//!
//! Every request gets an `x-request-id` (a UUIDv7 unless the client sent
//! one), which is copied onto the response. Credentials are marked sensitive
//! so the trace layer never logs them.

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
};
use uuid::Uuid;

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Sensitive headers that should be masked in logs
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
];

/// Generates time-ordered UUIDv7 request ids
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeUuidV7RequestId;

impl MakeRequestId for MakeUuidV7RequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&Uuid::now_v7().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

/// Assign a request id to requests that lack one
pub fn request_id_layer() -> SetRequestIdLayer<MakeUuidV7RequestId> {
    SetRequestIdLayer::x_request_id(MakeUuidV7RequestId)
}

/// Copy the request id onto the response
pub fn request_id_propagation_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Mark credential headers as sensitive
pub fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new(SENSITIVE_HEADERS.iter().copied().map(HeaderName::from_static))
}
