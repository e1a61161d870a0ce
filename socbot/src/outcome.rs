//! Tri-state operation outcomes.
//!
//! Every workflow step returns [`OperationResult`]. A failure carries the step
//! that produced it and a [`Severity`] telling the caller how far to unwind.

use crate::errors::AutomationError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Logged, processing continues.
    Recoverable = 1,
    /// The current record or step is abandoned.
    Fatal = 2,
    /// The browser session is gone, nothing else can run.
    Terminal = 3,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Recoverable => "recoverable",
            Severity::Fatal => "fatal",
            Severity::Terminal => "terminal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub step: String,
    pub message: String,
    pub severity: Severity,
}

pub type OperationResult<T = ()> = Result<T, Failure>;

impl Failure {
    pub fn new(step: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn recoverable(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(step, message, Severity::Recoverable)
    }

    pub fn fatal(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(step, message, Severity::Fatal)
    }

    pub fn terminal(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(step, message, Severity::Terminal)
    }

    /// Classify a low-level error. A lost session is always terminal,
    /// anything else gets the severity the caller asked for.
    pub fn from_error(step: impl Into<String>, err: &AutomationError, severity: Severity) -> Self {
        let severity = if err.is_session_lost() {
            Severity::Terminal
        } else {
            severity
        };
        Self::new(step, err.to_string(), severity)
    }

    pub fn is_terminal(&self) -> bool {
        self.severity == Severity::Terminal
    }

    pub fn is_recoverable(&self) -> bool {
        self.severity == Severity::Recoverable
    }

    /// Same failure, escalated. Never lowers an existing severity.
    pub fn escalate(mut self, severity: Severity) -> Self {
        self.severity = self.severity.max(severity);
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.step, self.message, self.severity)
    }
}

impl std::error::Error for Failure {}

/// Logs a recoverable failure and swallows it; anything stronger is returned.
pub fn tolerate(result: OperationResult) -> OperationResult {
    match result {
        Err(failure) if failure.is_recoverable() => {
            tracing::warn!(step = %failure.step, "⚠️ {}", failure.message);
            Ok(())
        }
        other => other,
    }
}
