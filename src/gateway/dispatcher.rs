//! Execution dispatcher
//!
//! Runs an [`ExecutionPlan`] against one session opened for the request.
//!
//! ## Guarantees
//! - No statement runs unless a session was opened
//! - Batch statements run strictly in order, each awaited before the next
//! - A batch stops at its first failing statement; earlier effects stay
//! - The session is closed exactly once, after the outcome is known, or
//!   in the background if the dispatch future is dropped first

use std::sync::Arc;
use std::time::Duration;

use crate::config::ExecutionLimits;
use crate::driver::{GraphDriver, GraphSession, Parameters, Record};
use crate::observability::Logger;

use super::errors::{ExecutionFailure, FailureContext, GatewayError, GatewayResult};
use super::request::ExecutionPlan;

/// Successful result of a plan
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Records of the single statement, in database order
    Records(Vec<Record>),
    /// Number of batch statements executed
    Batch { count: usize },
}

/// Runs execution plans against the graph database
#[derive(Clone)]
pub struct Dispatcher {
    driver: Option<Arc<dyn GraphDriver>>,
    limits: ExecutionLimits,
}

impl Dispatcher {
    /// Create a dispatcher backed by `driver`
    pub fn new(driver: Arc<dyn GraphDriver>, limits: ExecutionLimits) -> Self {
        Self {
            driver: Some(driver),
            limits,
        }
    }

    /// Create a dispatcher with no driver; every dispatch fails with
    /// [`GatewayError::DriverUnavailable`]
    pub fn without_driver(limits: ExecutionLimits) -> Self {
        Self {
            driver: None,
            limits,
        }
    }

    /// Whether a driver is configured
    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Open a session, run the plan, close the session.
    pub async fn dispatch(&self, plan: ExecutionPlan, request_id: &str) -> GatewayResult<ExecutionOutcome> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| GatewayError::DriverUnavailable("driver was not created".to_string()))?;

        let session = driver
            .open_session()
            .map_err(|e| GatewayError::DriverUnavailable(e.to_string()))?;
        let mut guard = SessionGuard::new(session, request_id);

        let outcome = match guard.session.as_deref_mut() {
            Some(session) => self.execute(session, plan).await,
            None => Err(GatewayError::DriverUnavailable("session was released".to_string())),
        };

        guard.close().await;
        Logger::trace("SESSION_CLOSED", &[("request_id", request_id)]);

        if let Err(GatewayError::Execution(failure)) = &outcome {
            log_failure(request_id, failure);
        }

        outcome
    }

    async fn execute(
        &self,
        session: &mut dyn GraphSession,
        plan: ExecutionPlan,
    ) -> GatewayResult<ExecutionOutcome> {
        match plan {
            ExecutionPlan::Batch(statements) => self.run_batch(session, &statements).await,
            ExecutionPlan::Single {
                statement,
                parameters,
            } => {
                let records = self
                    .run_statement(session, &statement, &parameters)
                    .await
                    .map_err(|details| ExecutionFailure::single(&statement, &parameters, details))?;
                Ok(ExecutionOutcome::Records(records))
            }
        }
    }

    async fn run_batch(
        &self,
        session: &mut dyn GraphSession,
        statements: &[String],
    ) -> GatewayResult<ExecutionOutcome> {
        let no_parameters = Parameters::new();

        for (index, statement) in statements.iter().enumerate() {
            // Later statements may depend on earlier ones; never run ahead.
            self.run_statement(session, statement, &no_parameters)
                .await
                .map_err(|details| ExecutionFailure::in_batch(index, statement, details))?;
        }

        Ok(ExecutionOutcome::Batch {
            count: statements.len(),
        })
    }

    /// Run one statement, applying the configured timeout.
    ///
    /// Errors are returned as their display text, ready to be attributed
    /// to the statement by the caller.
    async fn run_statement(
        &self,
        session: &mut dyn GraphSession,
        statement: &str,
        parameters: &Parameters,
    ) -> Result<Vec<Record>, String> {
        let run = session.run(statement, parameters);

        match self.limits.statement_timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), run).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("statement timed out after {} ms", ms)),
            },
            None => run.await.map_err(|e| e.to_string()),
        }
    }
}

/// Owns the session of one dispatch.
///
/// [`SessionGuard::close`] closes it in place. If the guard is dropped
/// while still holding the session (the request future was cancelled
/// mid-statement), the close is spawned onto the current runtime.
struct SessionGuard {
    session: Option<Box<dyn GraphSession>>,
    request_id: String,
}

impl SessionGuard {
    fn new(session: Box<dyn GraphSession>, request_id: &str) -> Self {
        Self {
            session: Some(session),
            request_id: request_id.to_string(),
        }
    }

    async fn close(mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    Logger::warn("SESSION_CLOSED_ON_CANCEL", &[("request_id", &self.request_id)]);
                    handle.spawn(async move {
                        session.close().await;
                    });
                }
                Err(_) => {
                    Logger::error("SESSION_LEAKED", &[("request_id", &self.request_id)]);
                }
            }
        }
    }
}

fn log_failure(request_id: &str, failure: &ExecutionFailure) {
    match &failure.context {
        FailureContext::Single { parameters } => {
            let names: Vec<&str> = parameters.keys().map(String::as_str).collect();
            let names = names.join(",");
            Logger::error(
                "STATEMENT_FAILED",
                &[
                    ("request_id", request_id),
                    ("mode", "single"),
                    ("statement", &failure.statement),
                    ("parameter_names", &names),
                    ("details", &failure.details),
                ],
            );
        }
        FailureContext::Batch { index } => {
            let index = index.to_string();
            Logger::error(
                "STATEMENT_FAILED",
                &[
                    ("request_id", request_id),
                    ("mode", "batch"),
                    ("statement", &failure.statement),
                    ("statement_index", &index),
                    ("details", &failure.details),
                ],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ScriptedDriver;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn dispatcher(driver: &ScriptedDriver) -> Dispatcher {
        Dispatcher::new(Arc::new(driver.clone()), ExecutionLimits::default())
    }

    fn batch(statements: &[&str]) -> ExecutionPlan {
        ExecutionPlan::Batch(statements.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_single_returns_records_in_order() {
        let driver = ScriptedDriver::new().respond(
            "MATCH (n) RETURN n.id AS id",
            vec![record(json!({"id": 2})), record(json!({"id": 1}))],
        );
        let plan = ExecutionPlan::Single {
            statement: "MATCH (n) RETURN n.id AS id".to_string(),
            parameters: Parameters::new(),
        };

        let outcome = dispatcher(&driver).dispatch(plan, "r").await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Records(vec![record(json!({"id": 2})), record(json!({"id": 1}))])
        );
        assert_eq!(driver.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_single_binds_parameters() {
        let driver = ScriptedDriver::new();
        let parameters = record(json!({"name": "Ada"}));
        let plan = ExecutionPlan::Single {
            statement: "CREATE (:Person {name: $name})".to_string(),
            parameters: parameters.clone(),
        };

        dispatcher(&driver).dispatch(plan, "r").await.unwrap();
        assert_eq!(
            driver.executed(),
            vec![("CREATE (:Person {name: $name})".to_string(), parameters)]
        );
    }

    #[tokio::test]
    async fn test_single_failure_carries_statement_and_parameters() {
        let driver = ScriptedDriver::new().fail("RETURN $x +", "Invalid input");
        let parameters = record(json!({"x": 1}));
        let plan = ExecutionPlan::Single {
            statement: "RETURN $x +".to_string(),
            parameters: parameters.clone(),
        };

        let err = dispatcher(&driver).dispatch(plan, "r").await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Execution(ExecutionFailure {
                statement: "RETURN $x +".to_string(),
                details: "Invalid input".to_string(),
                context: FailureContext::Single { parameters },
            })
        );
        assert_eq!(driver.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_batch_runs_in_order_without_parameters() {
        let driver = ScriptedDriver::new();

        let outcome = dispatcher(&driver)
            .dispatch(batch(&["CREATE (a)", "CREATE (b)"]), "r")
            .await
            .unwrap();

        assert_eq!(outcome, ExecutionOutcome::Batch { count: 2 });
        assert_eq!(driver.executed_statements(), vec!["CREATE (a)", "CREATE (b)"]);
        assert!(driver.executed().iter().all(|(_, p)| p.is_empty()));
    }

    #[tokio::test]
    async fn test_batch_stops_at_first_failure() {
        let driver = ScriptedDriver::new().fail("INVALID CYPHER", "Invalid input 'I'");

        let err = dispatcher(&driver)
            .dispatch(
                batch(&["MATCH (n) RETURN n", "INVALID CYPHER", "CREATE (c)"]),
                "r",
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GatewayError::Execution(ExecutionFailure::in_batch(
                1,
                "INVALID CYPHER",
                "Invalid input 'I'".to_string()
            ))
        );
        assert_eq!(
            driver.executed_statements(),
            vec!["MATCH (n) RETURN n", "INVALID CYPHER"]
        );
        assert_eq!(driver.sessions_opened(), 1);
        assert_eq!(driver.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_missing_driver_is_infrastructure_error() {
        let dispatcher = Dispatcher::without_driver(ExecutionLimits::default());
        assert!(!dispatcher.has_driver());

        let err = dispatcher.dispatch(batch(&["CREATE (a)"]), "r").await.unwrap_err();
        assert!(matches!(err, GatewayError::DriverUnavailable(_)));
    }

    #[tokio::test]
    async fn test_session_open_failure_runs_nothing() {
        let driver = ScriptedDriver::unavailable("connection refused");

        let err = dispatcher(&driver).dispatch(batch(&["CREATE (a)"]), "r").await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::DriverUnavailable("Driver unavailable: connection refused".to_string())
        );
        assert!(driver.executed().is_empty());
    }

    #[tokio::test]
    async fn test_statement_timeout() {
        let driver = ScriptedDriver::new().stall("CALL slow()");
        let limits = ExecutionLimits {
            statement_timeout_ms: Some(20),
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(Arc::new(driver.clone()), limits);

        let err = dispatcher.dispatch(batch(&["CALL slow()"]), "r").await.unwrap_err();
        match err {
            GatewayError::Execution(failure) => {
                assert_eq!(failure.statement, "CALL slow()");
                assert_eq!(failure.details, "statement timed out after 20 ms");
            }
            other => panic!("expected execution error, got {:?}", other),
        }
        assert_eq!(driver.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_session_closed_when_dispatch_is_dropped() {
        let driver = ScriptedDriver::new().stall("CALL slow()");
        let dispatcher = dispatcher(&driver);

        let dispatch = dispatcher.dispatch(batch(&["CREATE (a)", "CALL slow()"]), "r");
        let result = tokio::time::timeout(Duration::from_millis(20), dispatch).await;
        assert!(result.is_err());

        // The close was spawned; let it run.
        for _ in 0..10 {
            if driver.sessions_closed() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(driver.sessions_opened(), 1);
        assert_eq!(driver.sessions_closed(), 1);
        assert_eq!(driver.executed_statements(), vec!["CREATE (a)", "CALL slow()"]);
    }
}
