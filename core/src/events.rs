use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use crate::info_tree::InfoTree;
use crate::results::ExecutedTestcaseRecord;
use crate::state::StateChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A line of controller output or a diagnostic produced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub text: String,
}

impl Notification {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    ShutdownComplete,
    ProcessExited { code: Option<i32> },
    OutputClosed,
    WriteFailed { message: String },
    Requested,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::ShutdownComplete => f.write_str("shutdown complete"),
            TerminationReason::ProcessExited { code: Some(code) } => {
                write!(f, "main controller exited with code {code}")
            }
            TerminationReason::ProcessExited { code: None } => {
                f.write_str("main controller was terminated by a signal")
            }
            TerminationReason::OutputClosed => f.write_str("main controller output closed"),
            TerminationReason::WriteFailed { message } => {
                write!(f, "writing to main controller failed: {message}")
            }
            TerminationReason::Requested => f.write_str("terminated on request"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Notification(Notification),
    StateChanged(StateChange),
    InfoTreeUpdated(Arc<InfoTree>),
    TestcaseFinished(ExecutedTestcaseRecord),
    /// A command line was written to the controller (without the newline).
    CommandSent(String),
    /// Emitted exactly once per session.
    Terminated { reason: TerminationReason },
}
