//! Credential gate
//!
//! A single shared secret carried in the `x-api-key` header. Runs before
//! the body is read; a rejected request never reaches the database.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use super::errors::{GatewayError, GatewayResult};

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// Check the request's API key against the configured secret.
///
/// Rejects when the header is missing or not valid UTF-8, when no secret
/// is configured, or when the values differ.
pub fn check_api_key(headers: &HeaderMap, expected: Option<&str>) -> GatewayResult<()> {
    let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());

    match (provided, expected) {
        (Some(provided), Some(expected)) if !expected.is_empty() => {
            if constant_time_str_eq(provided, expected) {
                Ok(())
            } else {
                Err(GatewayError::Forbidden)
            }
        }
        _ => Err(GatewayError::Forbidden),
    }
}

/// Constant-time comparison of two strings
fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
