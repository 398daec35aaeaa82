//! ObservationScope for begin/complete logging around one unit of work
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when finished
//! - Logs `{name}_INCOMPLETE` if dropped unfinished

use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that logs the lifecycle of a unit of work.
///
/// Every line it emits carries the fields it was created with (typically
/// a `request_id`) plus `elapsed_ms` on completion.
///
/// ```ignore
/// let scope = ObservationScope::with_fields("PROXY_REQUEST", &[("request_id", &id)]);
/// // ... do work ...
/// scope.complete_with_fields(&[("status", "200")]);
/// ```
pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    finished: bool,
}

impl ObservationScope {
    /// Create a new observation scope carrying fields on every line
    pub fn with_fields(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        let scope = Self {
            name,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
            finished: false,
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    /// Milliseconds since the scope was opened
    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    /// Mark the scope as successfully completed with additional fields
    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        let mut fields = extra.to_vec();
        fields.push(("elapsed_ms", &elapsed));
        self.emit(Severity::Info, "COMPLETE", &fields);
    }

    /// Mark the scope as failed
    ///
    /// `severity` lets callers log client rejections at WARN and
    /// database failures at ERROR.
    pub fn fail(mut self, severity: Severity, reason: &str, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        let mut fields = extra.to_vec();
        fields.push(("reason", reason));
        fields.push(("elapsed_ms", &elapsed));
        self.emit(severity, "FAILED", &fields);
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.extend_from_slice(extra);
        Logger::log(severity, &event, &fields);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}
