//! # Query Gateway
//!
//! The request pipeline behind `POST /api/proxy`:
//!
//! ```text
//! credential gate -> normalizer -> dispatcher -> formatter
//!    (auth.rs)      (request.rs)  (dispatcher.rs) (response.rs)
//! ```
//!
//! Auth and validation failures are decided before a session is opened.

pub mod auth;
pub mod dispatcher;
pub mod errors;
pub mod request;
pub mod response;

pub use auth::{check_api_key, API_KEY_HEADER};
pub use dispatcher::{Dispatcher, ExecutionOutcome};
pub use errors::{ExecutionFailure, FailureContext, GatewayError, GatewayResult};
pub use request::{normalize, ExecutionPlan, ParametersInput, RequestEnvelope, StatementsInput};

use axum::http::HeaderMap;

use crate::observability::{Logger, ObservationScope, Severity};

/// Shared secret plus dispatcher; one instance serves every request
#[derive(Clone)]
pub struct Gateway {
    api_key: Option<String>,
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn new(api_key: Option<String>, dispatcher: Dispatcher) -> Self {
        Self { api_key, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Credential gate on its own, for callers that must reject before
    /// reading the body.
    pub fn authorize(&self, headers: &HeaderMap, request_id: &str) -> GatewayResult<()> {
        check_api_key(headers, self.api_key.as_deref()).map_err(|err| {
            let present = if headers.contains_key(API_KEY_HEADER) { "true" } else { "false" };
            Logger::warn(
                "API_KEY_REJECTED",
                &[("request_id", request_id), ("header_present", present)],
            );
            err
        })
    }

    /// Run one proxied request through the whole pipeline.
    pub async fn handle(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        request_id: &str,
    ) -> GatewayResult<ExecutionOutcome> {
        let scope = ObservationScope::with_fields("PROXY_REQUEST", &[("request_id", request_id)]);

        let result = self.run(headers, body, request_id).await;

        match &result {
            Ok(outcome) => {
                let rows = match outcome {
                    ExecutionOutcome::Records(records) => records.len(),
                    ExecutionOutcome::Batch { count } => *count,
                };
                let rows = rows.to_string();
                scope.complete_with_fields(&[("status", "200"), ("count", &rows)]);
            }
            Err(err) => {
                let status = err.status_code().as_u16().to_string();
                let severity = if err.is_client_error() {
                    Severity::Warn
                } else {
                    Severity::Error
                };
                scope.fail(severity, &err.to_string(), &[("status", &status)]);
            }
        }

        result
    }

    async fn run(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        request_id: &str,
    ) -> GatewayResult<ExecutionOutcome> {
        self.authorize(headers, request_id)?;

        let envelope = RequestEnvelope::from_slice(body)?;
        let plan = normalize(envelope, self.dispatcher.limits())?;

        let count = plan.statement_count().to_string();
        Logger::info(
            "PROXY_PLAN",
            &[
                ("request_id", request_id),
                ("mode", plan.mode()),
                ("statements", &count),
            ],
        );

        self.dispatcher.dispatch(plan, request_id).await
    }
}
