use super::RoleName;
use serde::Serialize;
use std::fmt;

/// Classification of a failed call to an external service.
///
/// The orchestrator's retry policy is driven entirely by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credentials or configuration rejected. Never retried.
    Auth,
    RateLimit,
    Timeout,
    /// Output arrived but could not be parsed or failed validation
    Malformed,
    Unknown,
}

impl FailureKind {
    pub fn is_fatal(self) -> bool {
        matches!(self, FailureKind::Auth)
    }

    pub fn is_transient(self) -> bool {
        !self.is_fatal()
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Auth => "auth",
            FailureKind::RateLimit => "rate limit",
            FailureKind::Timeout => "timeout",
            FailureKind::Malformed => "malformed output",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A typed failure from an LLM or search adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct ServiceError {
    pub kind: FailureKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimit, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    /// Classify an HTTP status returned by a provider.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, truncate(body, 300));
        match status {
            401 | 403 | 404 => Self::auth(message),
            429 => Self::rate_limit(message),
            408 | 504 => Self::timeout(message),
            _ => Self::unknown(message),
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::malformed(format!("failed to decode response: {}", err))
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), &err.to_string())
        } else {
            Self::unknown(format!("request failed: {}", err))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// A role's output did not match its declared schema.
///
/// The diagnostic is fed back to the model on the next attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{role} output failed validation: {diagnostic}")]
pub struct ValidationFailure {
    pub role: RoleName,
    pub diagnostic: String,
}

impl ValidationFailure {
    pub fn new(role: RoleName, diagnostic: impl Into<String>) -> Self {
        Self {
            role,
            diagnostic: diagnostic.into(),
        }
    }
}

impl From<ValidationFailure> for ServiceError {
    fn from(failure: ValidationFailure) -> Self {
        ServiceError::malformed(failure.diagnostic)
    }
}

/// Some, but not all, per-keyword search queries failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialCoverageWarning {
    pub role: RoleName,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed_keyword_ids: Vec<String>,
}

impl fmt::Display for PartialCoverageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "partial coverage in {}: {}/{} queries succeeded (failed: {})",
            self.role,
            self.succeeded,
            self.attempted,
            self.failed_keyword_ids.join(", ")
        )
    }
}

/// Terminal failure of a run: the first irrecoverable cause and where it
/// happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{role} failed after {attempts} attempt(s): {cause}")]
pub struct PipelineError {
    pub role: RoleName,
    pub attempts: u32,
    #[source]
    pub cause: ServiceError,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        self.cause.kind
    }
}

/// Errors raised outside the pipeline core: configuration, input, IO.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
