//! # Response Formatting
//!
//! | Outcome                         | Status | Body                                      |
//! |---------------------------------|--------|-------------------------------------------|
//! | bad or missing API key          | 403    | `{error}`                                 |
//! | malformed body / no statement   | 400    | `{error}`                                 |
//! | undecodable parameter string    | 400    | `{error, details, receivedString}`        |
//! | body over the size limit        | 413    | `{error}`                                 |
//! | no driver / no session          | 500    | `{error}`                                 |
//! | batch success                   | 200    | `{success, message, count}`               |
//! | single success                  | 200    | `[record, ...]`                           |
//! | statement failure               | 500    | `{error, failedStatement, details, ...}`  |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use super::dispatcher::ExecutionOutcome;
use super::errors::{FailureContext, GatewayError};

impl GatewayError {
    /// JSON body for this error
    pub fn body(&self) -> Value {
        match self {
            GatewayError::InvalidParameters { details, received } => json!({
                "error": self.to_string(),
                "details": details,
                "receivedString": received,
            }),
            GatewayError::Execution(failure) => {
                let mut body = json!({
                    "error": self.to_string(),
                    "failedStatement": failure.statement,
                    "details": failure.details,
                });
                match &failure.context {
                    FailureContext::Single { parameters } => {
                        body["parameters"] = Value::Object(parameters.clone());
                    }
                    FailureContext::Batch { index } => {
                        body["statementIndex"] = json!(index);
                    }
                }
                body
            }
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

impl ExecutionOutcome {
    /// JSON body for this outcome
    pub fn body(&self) -> Value {
        match self {
            ExecutionOutcome::Records(records) => {
                Value::Array(records.iter().cloned().map(Value::Object).collect())
            }
            ExecutionOutcome::Batch { count } => json!({
                "success": true,
                "message": format!("Batch executed successfully. {} statements processed.", count),
                "count": count,
            }),
        }
    }
}

impl IntoResponse for ExecutionOutcome {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.body())).into_response()
    }
}
