use std::fmt;
use std::time::Duration;

/// Why an attempt failed, as described by the transport. `message` is
/// authored by the transport, never a raw client-library error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCause {
    pub status: Option<u16>,
    pub message: String,
}

impl FailureCause {
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into() }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into() }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCallOutcome {
    Success(Vec<u8>),
    RateLimited(Duration),
    AuthFailed,
    TransientFailure(FailureCause),
    PermanentFailure(FailureCause),
}

impl ApiCallOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ApiCallOutcome::Success(_) => OutcomeKind::Success,
            ApiCallOutcome::RateLimited(_) => OutcomeKind::RateLimited,
            ApiCallOutcome::AuthFailed => OutcomeKind::AuthFailed,
            ApiCallOutcome::TransientFailure(_) => OutcomeKind::TransientFailure,
            ApiCallOutcome::PermanentFailure(_) => OutcomeKind::PermanentFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    RateLimited,
    AuthFailed,
    TransientFailure,
    PermanentFailure,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::RateLimited => "rate_limited",
            OutcomeKind::AuthFailed => "auth_failed",
            OutcomeKind::TransientFailure => "transient_failure",
            OutcomeKind::PermanentFailure => "permanent_failure",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
