//! In-memory scripted driver
//!
//! Answers statements from a script instead of a database:
//!
//! ```ignore
//! let driver = ScriptedDriver::new()
//!     .respond("RETURN 1 AS x", vec![record(json!({"x": 1}))])
//!     .fail("INVALID CYPHER", "Invalid input 'I'")
//!     .stall("CALL slow()");
//! ```
//!
//! Statements that are not scripted succeed with no records. A stalled
//! statement never completes. Every
//! executed statement is recorded together with its parameters, and the
//! driver counts the sessions it opened and closed. Clones share state,
//! so a test can keep one clone while the gateway owns another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    BoxFuture, DriverError, DriverResult, GraphDriver, GraphSession, Parameters, Record,
};

#[derive(Debug, Clone)]
enum Reply {
    Records(Vec<Record>),
    Failure(String),
    Stall,
}

#[derive(Default)]
struct Shared {
    script: Mutex<HashMap<String, Reply>>,
    executed: Mutex<Vec<(String, Parameters)>>,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    unavailable: Option<String>,
}

/// Scripted in-memory driver
#[derive(Clone, Default)]
pub struct ScriptedDriver {
    shared: Arc<Shared>,
}

impl ScriptedDriver {
    /// Create a driver with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver whose `open_session` always fails
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                unavailable: Some(reason.into()),
                ..Default::default()
            }),
        }
    }

    /// Answer `statement` with `records`
    pub fn respond(self, statement: impl Into<String>, records: Vec<Record>) -> Self {
        self.script(statement.into(), Reply::Records(records));
        self
    }

    /// Fail `statement` with a query error carrying `message`
    pub fn fail(self, statement: impl Into<String>, message: impl Into<String>) -> Self {
        self.script(statement.into(), Reply::Failure(message.into()));
        self
    }

    /// Never answer `statement`
    pub fn stall(self, statement: impl Into<String>) -> Self {
        self.script(statement.into(), Reply::Stall);
        self
    }

    fn script(&self, statement: String, reply: Reply) {
        if let Ok(mut script) = self.shared.script.lock() {
            script.insert(statement, reply);
        }
    }

    /// Statements executed so far, in execution order
    pub fn executed_statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|(statement, _)| statement).collect()
    }

    /// Statements executed so far with the parameters they were bound to
    pub fn executed(&self) -> Vec<(String, Parameters)> {
        self.shared
            .executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }

    /// Number of sessions handed out
    pub fn sessions_opened(&self) -> usize {
        self.shared.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of sessions closed (repeated closes of one session count once)
    pub fn sessions_closed(&self) -> usize {
        self.shared.sessions_closed.load(Ordering::SeqCst)
    }
}

impl GraphDriver for ScriptedDriver {
    fn open_session(&self) -> DriverResult<Box<dyn GraphSession>> {
        if let Some(reason) = &self.shared.unavailable {
            return Err(DriverError::Unavailable(reason.clone()));
        }
        self.shared.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            shared: Arc::clone(&self.shared),
            closed: false,
        }))
    }
}

struct ScriptedSession {
    shared: Arc<Shared>,
    closed: bool,
}

impl ScriptedSession {
    /// `None` for a stalled statement
    fn answer(&self, statement: &str, parameters: &Parameters) -> Option<DriverResult<Vec<Record>>> {
        if self.closed {
            return Some(Err(DriverError::SessionClosed));
        }

        if let Ok(mut executed) = self.shared.executed.lock() {
            executed.push((statement.to_string(), parameters.clone()));
        }

        let reply = self
            .shared
            .script
            .lock()
            .ok()
            .and_then(|script| script.get(statement).cloned());

        match reply {
            Some(Reply::Records(records)) => Some(Ok(records)),
            Some(Reply::Failure(message)) => Some(Err(DriverError::Query {
                code: "Scripted.Failure".to_string(),
                message,
            })),
            Some(Reply::Stall) => None,
            None => Some(Ok(Vec::new())),
        }
    }
}

impl GraphSession for ScriptedSession {
    fn run<'a>(
        &'a mut self,
        statement: &'a str,
        parameters: &'a Parameters,
    ) -> BoxFuture<'a, DriverResult<Vec<Record>>> {
        let answer = self.answer(statement, parameters);
        Box::pin(async move {
            // Behave like a real driver: every run is a suspension point.
            tokio::task::yield_now().await;
            match answer {
                Some(result) => result,
                None => std::future::pending().await,
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        if !self.closed {
            self.closed = true;
            self.shared.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
        Box::pin(async {})
    }
}
