//! # Graph Database Driver
//!
//! The seam between the gateway and the graph database. The gateway only
//! ever sees these two traits:
//!
//! - [`GraphDriver`]: process-scoped, shared by all requests, hands out sessions
//! - [`GraphSession`]: owned by one request, runs statements, closed once
//!
//! Two implementations ship with the crate:
//!
//! - [`HttpGraphDriver`]: talks to the database's HTTP transactional endpoint
//! - [`ScriptedDriver`]: in-memory, answers from a script and records calls

pub mod http;
pub mod scripted;

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};
use thiserror::Error;

pub use http::HttpGraphDriver;
pub use scripted::ScriptedDriver;

/// Named values bound into a statement
pub type Parameters = Map<String, Value>;

/// One result row, field name to value, in the order the database returned the columns
pub type Record = Map<String, Value>;

/// Boxed future returned by session operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Driver errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DriverError {
    /// The driver could not be created or cannot hand out sessions
    #[error("Driver unavailable: {0}")]
    Unavailable(String),

    /// The database rejected the statement
    #[error("{message}")]
    Query { code: String, message: String },

    /// The database could not be reached or answered with an HTTP error
    #[error("Transport error: {0}")]
    Transport(String),

    /// The database answered with something we could not decode
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// `run` was called after `close`
    #[error("Session is closed")]
    SessionClosed,
}

/// Process-wide handle to the graph database.
///
/// Implementations must be safe to share between concurrent requests.
pub trait GraphDriver: Send + Sync {
    /// Open a session for the lifetime of one request
    fn open_session(&self) -> DriverResult<Box<dyn GraphSession>>;
}

/// A per-request session.
pub trait GraphSession: Send {
    /// Run one statement and collect every record it returns
    fn run<'a>(
        &'a mut self,
        statement: &'a str,
        parameters: &'a Parameters,
    ) -> BoxFuture<'a, DriverResult<Vec<Record>>>;

    /// Release the session. Calling it more than once is a no-op.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}
