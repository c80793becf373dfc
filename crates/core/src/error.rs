//! Service error model.

use thiserror::Error;

/// Result type used by the invoice service and everything above it.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level error.
///
/// `Validation`, `NotFound` and `Conflict` are client-facing and carry a
/// human-readable message naming the offending key. `Internal` wraps an
/// underlying store failure and forwards its text unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The request was malformed (e.g. non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced client, product or invoice does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request collides with existing state (duplicate invoice number).
    #[error("{0}")]
    Conflict(String),

    /// The store failed; the operation was not applied.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code, used in HTTP error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }
}
