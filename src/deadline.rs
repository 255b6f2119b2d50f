//! Caller-supplied latency budget for long-running analysis passes.

use crate::AnalyticsError;
use std::time::{Duration, Instant};

/// How many loop iterations pass between clock reads.
pub(crate) const CHECK_INTERVAL: usize = 1024;

/// Point in time after which an analysis pass must give up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// No limit
    pub fn unbounded() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
        }
    }

    /// Expire `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
        }
    }

    /// Build from an optional millisecond budget (config form)
    pub fn from_millis(budget_ms: Option<u64>) -> Self {
        match budget_ms {
            Some(ms) => Self::after(Duration::from_millis(ms)),
            None => Self::unbounded(),
        }
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    pub fn is_expired(&self) -> bool {
        match self.budget {
            Some(budget) => self.started.elapsed() >= budget,
            None => false,
        }
    }

    /// Fail with `DeadlineExceeded` once the budget is spent.
    pub fn check(&self, stage: &'static str) -> Result<(), AnalyticsError> {
        if !self.is_expired() {
            return Ok(());
        }
        let budget_ms = self.budget.map_or(0, |b| b.as_millis() as u64);
        tracing::warn!(stage, budget_ms, "analysis deadline exceeded");
        Err(AnalyticsError::DeadlineExceeded { stage, budget_ms })
    }

    /// Check only every [`CHECK_INTERVAL`] iterations (including the first).
    pub(crate) fn check_every(
        &self,
        iteration: usize,
        stage: &'static str,
    ) -> Result<(), AnalyticsError> {
        if iteration % CHECK_INTERVAL == 0 {
            self.check(stage)
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}
