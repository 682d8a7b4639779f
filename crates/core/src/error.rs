//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Business failures are split by how the caller must treat them:
/// precondition and validation failures reject the request, invariant
/// violations signal a programming error and abort the unit of work.
/// Insufficient stock is never an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not allowed in the current state (closed order,
    /// mismatched allocation target, load still in a rack, ...).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A domain invariant was violated. Fatal for the current unit of work.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(kind: &str, key: impl core::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {key}"))
    }

    /// True for errors that indicate a broken invariant rather than a
    /// rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}
