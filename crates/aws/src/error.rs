use std::fmt;

use aws_sdk_sns::error::{DisplayErrorContext, ProvideErrorMetadata};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Coarse error category carried by a failed [`Outcome`](crate::Outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid credentials/region.
    Config,
    /// A service client could not be constructed.
    Client,
    /// The cloud API returned an error.
    Provider,
    /// An argument was rejected before calling the provider.
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Client => write!(f, "client"),
            Self::Provider => write!(f, "provider"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// Finer classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFault {
    /// The service rejected or failed the request.
    Service,
    /// The request was throttled.
    Throttled,
    /// The request timed out.
    Timeout,
    /// Network or connection failure.
    Connection,
}

/// Errors produced by the facade layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwsError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A service client could not be constructed.
    #[error("client error: {0}")]
    Client(String),

    /// The AWS API returned an error; `message` is passed through unmodified.
    #[error("{message}")]
    Provider {
        fault: ProviderFault,
        message: String,
    },

    /// Empty or malformed argument, rejected locally.
    #[error("validation error: {0}")]
    Validation(String),
}

impl AwsError {
    /// The [`ErrorKind`] reported in a failed outcome.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Client(_) => ErrorKind::Client,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Build a provider error from a raw message, classifying it.
    pub fn provider(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Provider {
            fault: classify_fault(&message),
            message,
        }
    }

    /// Returns `true` if the failure is transient (throttling, timeout, network).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Provider {
                fault: ProviderFault::Throttled | ProviderFault::Timeout | ProviderFault::Connection,
                ..
            }
        )
    }
}

/// Classify an error message into a [`ProviderFault`].
///
/// Inspects the message for common patterns (throttling, timeout, connection).
pub fn classify_fault(error_str: &str) -> ProviderFault {
    let lower = error_str.to_lowercase();
    if lower.contains("throttl") || lower.contains("rate exceed") || lower.contains("too many") {
        ProviderFault::Throttled
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ProviderFault::Timeout
    } else if lower.contains("dispatch failure")
        || lower.contains("connection")
        || lower.contains("connect")
        || lower.contains("dns")
        || lower.contains("network")
    {
        ProviderFault::Connection
    } else {
        ProviderFault::Service
    }
}

/// Convert an SDK error into an [`AwsError::Provider`].
///
/// Service errors keep the provider's error code and message verbatim
/// (`"AccessDenied: Access Denied"`); transport errors fall back to the full
/// error chain.
pub fn classify_sdk_error<E>(err: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = match (err.code(), err.message()) {
        (Some(code), Some(msg)) => format!("{code}: {msg}"),
        (Some(code), None) => code.to_owned(),
        (None, Some(msg)) => msg.to_owned(),
        (None, None) => DisplayErrorContext(err).to_string(),
    };
    AwsError::provider(message)
}

/// Reject empty or whitespace-only identifiers before any network call.
pub(crate) fn require(field: &str, value: &str) -> Result<(), AwsError> {
    if value.trim().is_empty() {
        return Err(AwsError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
