//! Error taxonomy for upstream calls.
//!
//! Attempt-level errors (`Timeout`, `Transport`, `Upstream`) are produced by a
//! single try against a service and classified as transient or not. The retry
//! executor wraps the last of them in `Failed` once it stops trying.

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed attempt, reported to the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// The attempt exceeded its time bound.
    Timeout,
    /// Connection-level failure (refused, reset, DNS).
    Transport,
    /// The upstream answered with a failure status or a `success: false` envelope.
    Upstream { status: u16 },
}

impl ErrorKind {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ErrorKind::Timeout | ErrorKind::Transport => true,
            ErrorKind::Upstream { status } => *status >= 500 || *status == 429,
        }
    }
}

/// Errors surfaced by the service-client runtime.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration failed validation.
    #[error("invalid configuration for `{service}`: {field} {reason}")]
    ConfigInvalid {
        service: String,
        field: &'static str,
        reason: String,
    },

    /// The breaker denied the call; no request was sent.
    #[error("circuit open for service `{service}` (after {attempts} attempt(s))")]
    CircuitOpen { service: String, attempts: u32 },

    /// A single attempt exceeded its bound.
    #[error("attempt timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response, or a 2xx response whose envelope reports failure.
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The request could not be built; nothing was sent.
    #[error("invalid request: {0}")]
    Request(String),

    /// A successful response did not match the caller's expected shape.
    #[error("failed to decode response from `{service}`: {reason}")]
    Decode { service: String, reason: String },

    /// No client registered under this name.
    #[error("unknown service `{0}`")]
    UnknownService(String),

    /// A client is already registered under this name.
    #[error("service `{0}` is already registered")]
    DuplicateService(String),

    /// The call gave up; `source` is the last attempt's error.
    #[error("service `{service}` failed after {attempts} attempt(s): {source}")]
    Failed {
        service: String,
        attempts: u32,
        source: Box<ServiceError>,
    },
}

impl ServiceError {
    /// Attempt-level classification, if this is (or wraps) an attempt error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::Timeout { .. } => Some(ErrorKind::Timeout),
            ServiceError::Transport(_) => Some(ErrorKind::Transport),
            ServiceError::Upstream { status, .. } => Some(ErrorKind::Upstream { status: *status }),
            ServiceError::Failed { source, .. } => source.kind(),
            _ => None,
        }
    }

    /// Whether the error is worth retrying.
    pub fn is_transient(&self) -> bool {
        self.kind().is_some_and(|k| k.is_transient())
    }

    /// Number of attempts made, for errors produced by the retry executor.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ServiceError::Failed { attempts, .. } | ServiceError::CircuitOpen { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ServiceError::CircuitOpen { .. })
    }

    pub(crate) fn invalid(service: &str, field: &'static str, reason: impl Into<String>) -> Self {
        ServiceError::ConfigInvalid {
            service: service.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;
