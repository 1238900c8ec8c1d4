//! Caller-supplied request deadlines.

use std::time::{Duration, Instant};

use crate::error::{DomainError, DomainResult};

/// Point in (monotonic) time after which a request should stop doing new work.
///
/// Multi-step operations check the deadline between steps; steps that already
/// happened are compensated rather than left half-applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn has_elapsed(&self) -> bool {
        Instant::now() >= self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Fail with `DeadlineExceeded` once the deadline has passed.
    pub fn check(&self) -> DomainResult<()> {
        if self.has_elapsed() {
            Err(DomainError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_deadline_fails_check() {
        let deadline = Deadline::at(Instant::now());
        assert_eq!(deadline.check(), Err(DomainError::DeadlineExceeded));
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn future_deadline_passes_check() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(deadline.check().is_ok());
        assert!(deadline.remaining() > Duration::from_secs(30));
    }
}
