//! Aggregate roots and optimistic concurrency expectations.

use crate::entity::Versioned;
use crate::error::{DomainError, DomainResult};

/// Aggregate root marker.
///
/// An aggregate root is the consistency boundary for a cluster of entities
/// (an outbound order with its demand lines and allocation records, a unit
/// load with its items). All mutations of the cluster go through the root and
/// are persisted together under one version check.
pub trait AggregateRoot: Versioned {}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (used when creating new rows).
    Any,
    /// Require the aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expect whatever version the loaded aggregate currently carries.
    pub fn of<A: Versioned>(aggregate: &A) -> Self {
        ExpectedVersion::Exact(aggregate.version())
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, kind: &str, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "{kind}: optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
