//! Shared health state for the /health endpoint.
//! Updated by the cycle handlers after every run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cycle counters. Written by request handlers, read by /health.
#[derive(Default)]
pub struct HealthState {
    pub cycles_completed: AtomicU64,
    pub cycles_failed: AtomicU64,
    /// Unix seconds of the last successful cycle (0 = none yet).
    pub last_cycle_at: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at_secs: u64) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_at.store(at_secs, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    pub fn last_cycle_at(&self) -> u64 {
        self.last_cycle_at.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_successes_and_failures() {
        let health = HealthState::new();
        health.record_success(100);
        health.record_failure();
        health.record_success(200);
        assert_eq!(health.cycles_completed(), 2);
        assert_eq!(health.cycles_failed(), 1);
        assert_eq!(health.last_cycle_at(), 200);
    }
}
