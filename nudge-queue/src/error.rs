use nudge_core::{ErrorKind, NudgeError};
use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for queue operations
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// The durable store could not be reached. Callers can tell this apart
    /// from every other failure via [`QueueError::is_connectivity`].
    #[error("Queue store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid lease token")]
    InvalidLeaseToken,

    #[error("Lease has expired")]
    LeaseExpired,

    #[error("Job is already in terminal state")]
    JobAlreadyTerminal,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Worker shutdown")]
    WorkerShutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// True when the store itself is unreachable (as opposed to a bad request).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Position of this error in the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) | Self::WorkerShutdown => ErrorKind::ServiceUnavailable,
            Self::InvalidArgument(_) | Self::InvalidSchedule { .. } | Self::Serialization(_) => {
                ErrorKind::Validation
            }
            Self::JobNotFound(_) => ErrorKind::NotFound,
            Self::InvalidLeaseToken
            | Self::LeaseExpired
            | Self::JobAlreadyTerminal
            | Self::Internal(_) => ErrorKind::Generic,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<QueueError> for NudgeError {
    fn from(err: QueueError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        NudgeError::new(kind, message).with_source(anyhow::Error::new(err))
    }
}

/// Job execution outcome - determines retry behavior
#[derive(Error, Debug, Clone)]
pub enum JobError {
    /// Retryable error - the store schedules another attempt if any remain
    #[error("Retryable error: {0}")]
    Retryable(String),

    /// Permanent error - fail immediately, no retry
    #[error("Permanent error: {0}")]
    Permanent(String),

    /// No handler exists for the job's type tag
    #[error("Unknown job type: {0}")]
    UnknownType(String),
}

impl JobError {
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) | Self::UnknownType(msg) => msg,
        }
    }

    /// Text recorded as the attempt's error
    pub fn describe(&self) -> String {
        match self {
            Self::UnknownType(tag) => format!("Unknown job type: {}", tag),
            other => other.message().to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownType(_) => ErrorKind::UnknownJobType,
            Self::Permanent(_) => ErrorKind::Validation,
            Self::Retryable(_) => ErrorKind::Generic,
        }
    }
}

/// Collaborator failures always go back to the store as retryable; the
/// queue policy decides between another attempt and exhaustion.
impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::Retryable(format!("{:#}", err))
    }
}
