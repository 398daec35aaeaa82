//! Observability HTTP Routes
//!
//! `GET /health` - liveness plus whether a database driver was created.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::gateway::Gateway;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub driver: &'static str,
}

impl HealthResponse {
    fn for_gateway(gateway: &Gateway) -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            driver: if gateway.dispatcher().has_driver() {
                "available"
            } else {
                "unavailable"
            },
        }
    }
}

/// Health check route
pub fn health_routes(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(gateway)
}

/// Health check handler
async fn health_handler(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::for_gateway(&gateway)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionLimits;
    use crate::gateway::Dispatcher;

    #[test]
    fn test_health_reports_missing_driver() {
        let gateway = Gateway::new(None, Dispatcher::without_driver(ExecutionLimits::default()));
        let json = serde_json::to_value(HealthResponse::for_gateway(&gateway)).unwrap();

        assert_eq!(json["status"], "ok");
        assert_eq!(json["driver"], "unavailable");
    }
}
