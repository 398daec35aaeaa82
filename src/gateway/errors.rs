//! # Gateway Errors
//!
//! Every way a proxied request can fail, and the HTTP status it maps to.
//! The JSON bodies are built in [`super::response`].

use axum::http::StatusCode;
use thiserror::Error;

use crate::driver::Parameters;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    // ==================
    // Auth Errors (403)
    // ==================
    /// Missing or mismatching `x-api-key` header
    #[error("Forbidden: Invalid API Key")]
    Forbidden,

    // ==================
    // Validation Errors (400)
    // ==================
    /// Body is not a JSON object of the expected shape
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Neither a statement nor a non-empty batch was supplied
    #[error("Request body must contain either \"statement\" or \"statements\"")]
    MissingStatement,

    /// `parameters` was a string that did not decode to a JSON object
    #[error("Invalid JSON in parameters string")]
    InvalidParameters { details: String, received: String },

    /// Batch longer than the configured maximum
    #[error("Batch of {count} statements exceeds maximum of {max}")]
    BatchTooLarge { count: usize, max: usize },

    // ==================
    // Payload Errors (413)
    // ==================
    /// Body longer than the server's configured limit
    #[error("Request body exceeds the maximum allowed size")]
    BodyTooLarge,

    // ==================
    // Infrastructure Errors (500)
    // ==================
    /// No driver, or the driver could not open a session. The reason is
    /// logged, never returned to the caller.
    #[error("Server Error: graph database driver is not available")]
    DriverUnavailable(String),

    // ==================
    // Execution Errors (500)
    // ==================
    /// A statement failed while running against the database
    #[error("Failed to execute query")]
    Execution(ExecutionFailure),
}

/// Which statement failed, and why.
///
/// Built at the point of failure from the statement being executed, so
/// the attribution is always the statement that actually ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionFailure {
    pub statement: String,
    pub details: String,
    pub context: FailureContext,
}

/// Where the failing statement came from
#[derive(Debug, Clone, PartialEq)]
pub enum FailureContext {
    /// The single statement, with the parameters it was bound to
    Single { parameters: Parameters },
    /// A batch statement, by zero-based position
    Batch { index: usize },
}

impl ExecutionFailure {
    pub fn single(statement: &str, parameters: &Parameters, details: String) -> Self {
        Self {
            statement: statement.to_string(),
            details,
            context: FailureContext::Single {
                parameters: parameters.clone(),
            },
        }
    }

    pub fn in_batch(index: usize, statement: &str, details: String) -> Self {
        Self {
            statement: statement.to_string(),
            details,
            context: FailureContext::Batch { index },
        }
    }
}

impl From<ExecutionFailure> for GatewayError {
    fn from(failure: ExecutionFailure) -> Self {
        GatewayError::Execution(failure)
    }
}

impl GatewayError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Forbidden => StatusCode::FORBIDDEN,

            GatewayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::MissingStatement => StatusCode::BAD_REQUEST,
            GatewayError::InvalidParameters { .. } => StatusCode::BAD_REQUEST,
            GatewayError::BatchTooLarge { .. } => StatusCode::BAD_REQUEST,

            GatewayError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            GatewayError::DriverUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors caused by the caller's request
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}
