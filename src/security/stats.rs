//! Security counters.

use super::decision::{Counter, Decision};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Access-denied and error counts shared by every request handler.
///
/// Increments use relaxed ordering: only their total matters.
#[derive(Debug, Default)]
pub struct SecurityStats {
    access: AtomicU64,
    errors: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub access_denied: u64,
    pub errors: u64,
}

impl SecurityStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge a decision to its counter. Allowed requests are not counted.
    pub fn record(&self, decision: &Decision) {
        if let Some(denial) = decision.denial() {
            match denial.counter() {
                Counter::AccessDenied => self.access.fetch_add(1, Ordering::Relaxed),
                Counter::Error => self.errors.fetch_add(1, Ordering::Relaxed),
            };
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            access_denied: self.access.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
