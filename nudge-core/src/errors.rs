//! # Errors
//!
//! nudge shares one error taxonomy between the job queue and the bot
//! middleware pipeline.
//! Core goals:
//! - a small, closed set of kinds with stable codes
//! - can be carried through `anyhow::Error` (handlers, collaborators, wrappers)
//! - transport-agnostic (the error boundary decides what the user sees)
//!
//! If you enable feature `serde`, you also get:
//! - `data` as serde_json::Value
//! - `to_json()` helper

use std::fmt;

use anyhow::Error as AnyError;

/// A convenience result type for nudge APIs that speak `anyhow`.
pub type NudgeResult<T> = std::result::Result<T, AnyError>;

/// Error taxonomy shared by the queue and the bot pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// Bad input shape.
    Validation,
    Authentication,
    Authorization,
    NotFound,
    /// Store or transport unreachable.
    ServiceUnavailable,
    /// Dispatch-time: no handler for the job's type tag.
    UnknownJobType,
    Generic,
}

impl ErrorKind {
    /// Stable code string, e.g. `VALIDATION_ERROR`.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Authentication => "AUTHENTICATION_ERROR",
            ErrorKind::Authorization => "AUTHORIZATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::UnknownJobType => "UNKNOWN_JOB_TYPE",
            ErrorKind::Generic => "GENERIC",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "VALIDATION_ERROR" => Some(ErrorKind::Validation),
            "AUTHENTICATION_ERROR" => Some(ErrorKind::Authentication),
            "AUTHORIZATION_ERROR" => Some(ErrorKind::Authorization),
            "NOT_FOUND_ERROR" => Some(ErrorKind::NotFound),
            "SERVICE_UNAVAILABLE" => Some(ErrorKind::ServiceUnavailable),
            "UNKNOWN_JOB_TYPE" => Some(ErrorKind::UnknownJobType),
            "GENERIC" => Some(ErrorKind::Generic),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(feature = "serde")]
pub type ErrorValue = serde_json::Value;

#[cfg(not(feature = "serde"))]
pub type ErrorValue = std::sync::Arc<dyn std::any::Any + Send + Sync>;

/// A structured nudge error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct NudgeError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<ErrorValue>,
    pub source: Option<AnyError>,
}

impl NudgeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: ErrorValue) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Convert into `anyhow::Error` so it flows through handlers and wrappers.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `NudgeError` anywhere in the context chain of an `anyhow::Error`.
    pub fn from_anyhow(err: &AnyError) -> Option<&NudgeError> {
        err.chain().find_map(|e| e.downcast_ref::<NudgeError>())
    }

    /// Kind of any error; errors that carry no `NudgeError` are `Generic`.
    pub fn kind_of(err: &AnyError) -> ErrorKind {
        Self::from_anyhow(err).map(|e| e.kind).unwrap_or(ErrorKind::Generic)
    }

    /// Turn any error into a NudgeError:
    /// - if it's already a NudgeError, keep it (lossless)
    /// - otherwise wrap as Generic
    pub fn normalize(err: AnyError) -> NudgeError {
        match err.downcast::<NudgeError>() {
            Ok(nudge) => nudge,
            Err(other) => NudgeError::new(ErrorKind::Generic, other.to_string()).with_source(other),
        }
    }

    /// Copy that is safe to show to a user: the inner `source` is dropped.
    pub fn sanitize_for_user(&self) -> NudgeError {
        NudgeError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            source: None,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, msg)
    }
    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, msg)
    }
    pub fn unknown_job_type(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownJobType, msg)
    }
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, msg)
    }
}

impl fmt::Display for NudgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message)
    }
}

impl std::error::Error for NudgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(feature = "serde")]
impl NudgeError {
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut base = json!({
            "code": self.code(),
            "message": self.message,
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        base
    }
}

/// Convenience helper for "bail with NudgeError".
#[macro_export]
macro_rules! bail_nudge {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::NudgeError::$ctor($msg).into_anyhow());
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::NudgeError::$ctor(format!($fmt, $($arg)*)).into_anyhow());
    };
}
