//! # HTTP Server
//!
//! Combines the proxy and health routers into one Axum server.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::gateway::Gateway;
use crate::observability::Logger;

use super::config::HttpServerConfig;
use super::observability_routes::health_routes;
use super::proxy_routes::proxy_routes;

/// HTTP server for the gateway
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server that proxies through `gateway`
    pub fn new(config: HttpServerConfig, gateway: Gateway) -> Self {
        let router = Self::build_router(&config, Arc::new(gateway));
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    fn build_router(config: &HttpServerConfig, gateway: Arc<Gateway>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes(gateway.clone()))
            .nest("/api", proxy_routes(gateway, config.max_body_bytes))
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the process exits
    pub async fn start(self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        let addr = listener.local_addr()?.to_string();
        Logger::info("HTTP_SERVER_STARTING", &[("addr", &addr), ("endpoint", "/api/proxy")]);

        axum::serve(listener, self.router).await
    }
}
