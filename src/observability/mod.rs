//! Observability for graphgate
//!
//! Structured JSON logging only. Every proxied request gets a
//! `request_id`, and every line logged on its behalf carries it.
//!
//! # Usage
//!
//! ```ignore
//! use graphgate::observability::{Logger, ObservationScope};
//!
//! Logger::warn("API_KEY_REJECTED", &[("request_id", &id)]);
//!
//! let scope = ObservationScope::with_fields("PROXY_REQUEST", &[("request_id", &id)]);
//! // ... do work ...
//! scope.complete_with_fields(&[("status", "200")]);
//! ```
//!
//! Secrets (API keys, database passwords) are never passed to the logger.

mod logger;
mod scope;

pub use logger::{Logger, Severity};
pub use scope::ObservationScope;
