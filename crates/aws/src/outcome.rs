use serde::Serialize;

use crate::error::{AwsError, ErrorKind};

/// Result of a facade operation: a value, or a categorized failure message.
///
/// Every facade method returns an `Outcome` instead of propagating errors, so
/// callers pattern-match rather than unwind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The operation completed.
    Success(T),
    /// The operation failed; `message` is ready for display.
    Failure { kind: ErrorKind, message: String },
}

impl<T> Outcome<T> {
    /// Build a failure from an [`AwsError`].
    pub fn failure(err: &AwsError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The failure kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// The failure message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    /// Borrow the success value.
    pub fn as_success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Take the success value, discarding a failure.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Map the success value.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure { kind, message } => Outcome::Failure { kind, message },
        }
    }

    /// Take the success value or a fallback.
    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.success().unwrap_or_default()
    }

    /// Convert into a `Result` with `(kind, message)` as the error.
    pub fn into_result(self) -> Result<T, (ErrorKind, String)> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure { kind, message } => Err((kind, message)),
        }
    }
}

impl<T> From<Result<T, AwsError>> for Outcome<T> {
    fn from(result: Result<T, AwsError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::failure(&err),
        }
    }
}

/// Acknowledgement of a mutating call that returns no payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ack;
