//! Request admission: method allow-list, size cap, CORS preflight.
//!
//! Admission runs before anything that costs money or I/O. OPTIONS requests
//! short-circuit with the CORS preflight answer; everything else is checked
//! for an allowed method and a declared body size within bounds.

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, Response, StatusCode};

use crate::error::GatewayError;

/// Header set attached to preflight answers and payment challenges.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, OPTIONS"),
    (
        "access-control-allow-headers",
        "Content-Type, Authorization, User-Agent, X-402-Payment",
    ),
    ("access-control-max-age", "86400"),
];

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Builds the `200` CORS preflight response.
#[must_use]
pub fn preflight_response() -> Response<Body> {
    let mut builder = Response::builder().status(StatusCode::OK);
    for (name, value) in CORS_HEADERS {
        builder = builder.header(name, value);
    }
    builder
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::empty())
        .expect("static preflight response")
}

/// Validates method and declared size.
///
/// # Errors
///
/// [`GatewayError::BadRequest`] for a disallowed method,
/// [`GatewayError::PayloadTooLarge`] when `Content-Length` exceeds
/// `max_request_size`. A missing or unparseable `Content-Length` admits the
/// request; axum's body limits still bound what is actually read.
pub fn admit(
    method: &Method,
    headers: &HeaderMap,
    max_request_size: u64,
) -> Result<(), GatewayError> {
    if !ALLOWED_METHODS.contains(method) {
        return Err(GatewayError::BadRequest(format!(
            "method {method} is not supported"
        )));
    }
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = declared {
        if length > max_request_size {
            return Err(GatewayError::PayloadTooLarge {
                limit: max_request_size,
            });
        }
    }
    Ok(())
}
