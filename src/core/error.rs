//! Error types for dispatch operations.

use std::time::Duration;

use thiserror::Error;

use crate::util::CredentialId;

/// Errors produced by dispatcher components.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A dispatch run is already active on this dispatcher.
    #[error("a dispatch run is already in progress")]
    RunInProgress,
    /// The credential pool has no members.
    #[error("no credentials available")]
    NoCredentials,
    /// The credential has no remaining capacity for this run.
    #[error("quota exhausted for credential {0}")]
    QuotaExhausted(CredentialId),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A job or job list failed validation before entering the core.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The run finished without handing back its report.
    #[error("run aborted: {0}")]
    Aborted(String),
    /// Filesystem failure in an infra adapter.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a job is rejected before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Recipient does not have the shape `local@domain.tld`.
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    /// Line does not have exactly three comma-separated fields.
    #[error("malformed line {line}: {content}")]
    MalformedLine {
        /// One-based line number.
        line: usize,
        /// Raw line content.
        content: String,
    },
    /// The referenced content could not be resolved.
    #[error("content file {0} not found")]
    MissingContent(String),
}

/// Typed failure returned by a mail transport for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The account is being throttled; retry with jittered backoff.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Transport-provided detail.
        message: String,
        /// Server hint for the earliest retry, if any.
        retry_after: Option<Duration>,
    },
    /// A failure that may succeed on a later attempt.
    #[error("transient failure: {message}")]
    Transient {
        /// Transport-provided detail.
        message: String,
    },
    /// A failure that will not succeed on retry (bad recipient, rejected message).
    #[error("permanent failure: {reason}")]
    Permanent {
        /// Transport-provided reason.
        reason: String,
    },
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "user-rate limit exceeded",
    "you have reached a limit for sending mail",
    "rate limit",
    "ratelimit",
    "quota exceeded",
    "too many requests",
];

impl SendError {
    /// Classify free-form transport error text.
    ///
    /// Rate-limit shaped messages become [`SendError::RateLimited`]; anything
    /// else is treated as [`SendError::Transient`]. Transports that know a
    /// failure is permanent should construct [`SendError::Permanent`] directly.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();
        if RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m)) {
            Self::RateLimited {
                message,
                retry_after: None,
            }
        } else {
            Self::Transient { message }
        }
    }

    /// Whether this error indicates account throttling.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether this error should never be retried under the default policy.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
