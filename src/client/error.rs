use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Terminal failure kinds a caller can observe. Rate limiting never shows up
/// here on its own: once retries are exhausted it surfaces as a transient
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthFailed,
    TransientFailure,
    PermanentFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailed => "auth_failed",
            ErrorKind::TransientFailure => "transient_failure",
            ErrorKind::PermanentFailure => "permanent_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// Terminal failure of one logical call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} after {attempts} attempt(s) in {elapsed:?}: {reason}")]
pub struct CallError {
    pub kind: ErrorKind,
    pub attempts: u32,
    pub elapsed: Duration,
    pub reason: String,
    /// upstream status, when the transport reported one
    pub status: Option<u16>,
}

impl CallError {
    pub fn is_deadline_exceeded(&self) -> bool {
        self.kind == ErrorKind::TransientFailure && self.reason == DEADLINE_EXCEEDED
    }
}
