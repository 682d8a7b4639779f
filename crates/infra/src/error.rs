//! Error types of the infrastructure layer.

use thiserror::Error;

use rackwms_core::DomainError;

/// Storage failure unrelated to business rules.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,

    #[error("duplicate {kind}: {key}")]
    Duplicate { kind: &'static str, key: String },
}

/// Error surfaced by every warehouse operation.
///
/// The transaction that produced it has been rolled back.
#[derive(Debug, Error)]
pub enum WmsError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WmsError {
    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            WmsError::Domain(e) => Some(e),
            WmsError::Store(_) => None,
        }
    }

    /// True for invariant violations (programming errors, never retried).
    pub fn is_fatal(&self) -> bool {
        self.as_domain().is_some_and(DomainError::is_fatal)
    }
}

pub type WmsResult<T> = Result<T, WmsError>;
