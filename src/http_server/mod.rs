//! # graphgate HTTP Server Module
//!
//! # Endpoints
//!
//! - `POST /api/proxy` - Run Cypher statements (requires `x-api-key`)
//! - `GET /health` - Health check

pub mod config;
pub mod observability_routes;
pub mod proxy_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
