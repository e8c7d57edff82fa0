//! HTTP response building helpers
//!
//! Every handler answers through these so bodies and error shapes stay
//! uniform: JSON values on success, `{"error": "..."}` on failure.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::MarketError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

fn error_body(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}

pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::NOT_FOUND, message)
}

pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::BAD_REQUEST, message)
}

pub fn unauthorized() -> Response<Full<Bytes>> {
    error_body(StatusCode::UNAUTHORIZED, "Authentication required")
}

pub fn method_not_allowed() -> Response<Full<Bytes>> {
    error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Status code for an error
pub fn status_for(error: &MarketError) -> StatusCode {
    match error {
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::InvalidInput(_) | MarketError::Json(_) => StatusCode::BAD_REQUEST,
        MarketError::Unauthenticated => StatusCode::UNAUTHORIZED,
        MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
        MarketError::InvalidTransition { .. } | MarketError::Conflict(_) => StatusCode::CONFLICT,
        MarketError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
        MarketError::Database(_)
        | MarketError::Io(_)
        | MarketError::Config(_)
        | MarketError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a MarketError to an appropriate HTTP response
pub fn error_response(error: MarketError) -> Response<Full<Bytes>> {
    let status = status_for(&error);
    if status.is_server_error() {
        error!(error = %error, "Request failed");
    }
    error_body(status, &error.to_string())
}
