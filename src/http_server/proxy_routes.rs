//! Proxy HTTP Routes
//!
//! `POST /api/proxy` - run one statement or a batch against the graph database.
//!
//! The API key is checked in a route layer that only looks at headers, so
//! a caller without a valid key is answered 403 before any of the body is
//! buffered or measured against the size limit.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Extension, Router,
};
use uuid::Uuid;

use crate::gateway::{Gateway, GatewayError};
use crate::observability::Logger;

/// Per-request correlation id, assigned by the credential layer
#[derive(Debug, Clone)]
struct RequestId(String);

/// Proxy routes with shared state
pub fn proxy_routes(gateway: Arc<Gateway>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/proxy", post(proxy_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .route_layer(middleware::from_fn_with_state(gateway.clone(), require_api_key))
        .with_state(gateway)
}

/// Reject requests without a valid `x-api-key` before the body is read
async fn require_api_key(
    State(gateway): State<Arc<Gateway>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    if let Err(err) = gateway.authorize(request.headers(), &request_id) {
        return err.into_response();
    }

    request.extensions_mut().insert(RequestId(request_id));
    next.run(request).await
}

/// Proxy handler
///
/// Body rejections from axum (size limit, read failure) are turned into
/// the gateway's JSON error shape.
async fn proxy_handler(
    State(gateway): State<Arc<Gateway>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            Logger::warn(
                "PROXY_BODY_REJECTED",
                &[("request_id", &request_id), ("reason", &rejection.body_text())],
            );
            return body_error(&rejection).into_response();
        }
    };

    match gateway.handle(&headers, &body, &request_id).await {
        Ok(outcome) => outcome.into_response(),
        Err(err) => err.into_response(),
    }
}

fn body_error(rejection: &BytesRejection) -> GatewayError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::BodyTooLarge
    } else {
        GatewayError::InvalidBody(rejection.body_text())
    }
}
