//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{NAME}_BEGIN` on creation
//! - Logs `{NAME}_COMPLETE` with the elapsed time on `complete()`
//! - Logs `{NAME}_INCOMPLETE` on drop without completion

use std::cell::Cell;
use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that logs the lifecycle of one operation
///
/// ```ignore
/// let scope = ObservationScope::with_fields("ADD_LIST", &[("table", "Model")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("rows", "2")]);
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    severity: Severity,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    timer: Timer,
}

impl<'a> ObservationScope<'a> {
    /// Logs `{name}_BEGIN` at TRACE level
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Logs `{name}_BEGIN` at TRACE level with the given fields, which are
    /// repeated on every later line of the scope
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        let scope = Self {
            name,
            severity: Severity::Trace,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            timer: Timer::new(),
        };
        scope.emit(scope.severity, "BEGIN", &[]);
        scope
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let elapsed = self.timer.elapsed_ms();
        let mut fields = vec![("elapsed_ms", elapsed.as_str())];
        fields.extend(extra_fields.iter().copied());
        self.emit(self.severity, "COMPLETE", &fields);
    }

    /// Logs `{name}_FAILED` at ERROR level
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        self.emit(Severity::Error, "FAILED", &[("reason", reason)]);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    fn emit(&self, severity: Severity, suffix: &str, extra_fields: &[(&str, &str)]) {
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.extend(extra_fields.iter().copied());
        Logger::log(severity, &event, &fields);
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            self.emit(Severity::Warn, "INCOMPLETE", &[("reason", "scope dropped without completion")]);
        }
    }
}

/// A simple duration timer for logging elapsed time
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
