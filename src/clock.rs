//! The temporal source for time-based checks.
//!
//! All grace-period and default-instant logic reads "current time" through
//! the [`Clock`] trait rather than ambient global state, so tests substitute
//! a [`FixedClock`] instead of patching the process clock. A validation run
//! snapshots the clock once into its [`crate::ValidationContext`]; every
//! validator in the run observes the same instant.

use chrono::{DateTime, Utc};

/// Source of "current time" for default issue instants and temporal checks.
pub trait Clock: Send + Sync {
    /// Returns the current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The process clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant, for deterministic testing.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
