//! Optimistic concurrency primitives for versioned rows.

use crate::error::{DomainError, DomainResult};

/// A record whose writes are guarded by a monotonically increasing version.
///
/// Version `0` means "not yet persisted"; every successful write bumps it by one.
pub trait Versioned {
    /// Strongly-typed key the record is stored under.
    type Key: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the storage key.
    fn key(&self) -> Self::Key;

    /// Current persisted version.
    fn version(&self) -> u64;

    /// Stamp the version assigned by the store on write.
    fn set_version(&mut self, version: u64);

    /// Expectation to use when writing back a snapshot derived from `self`.
    fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.version())
    }
}

/// Optimistic concurrency expectation for a write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (compensating writes, migrations, etc.).
    Any,
    /// The record must not exist yet.
    Absent,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Absent => actual == 0,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_only_matches_version_zero() {
        assert!(ExpectedVersion::Absent.matches(0));
        assert!(!ExpectedVersion::Absent.matches(1));
    }

    #[test]
    fn exact_mismatch_is_a_conflict() {
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(ExpectedVersion::Exact(4).check(4).is_ok());
        assert!(ExpectedVersion::Any.check(17).is_ok());
    }
}
