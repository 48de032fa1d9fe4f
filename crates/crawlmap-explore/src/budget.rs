//! Wall-clock budget.
//!
//! Restarted at the start of every trace, then checked once per crawl-loop
//! iteration and before every backtrack tactic. Running out ends the trace
//! cleanly; it is never an error.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TimeBudget {
    limit: Duration,
    start: Instant,
}

impl TimeBudget {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            start: Instant::now(),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// A budget that is already spent.
    pub fn spent() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Start counting again from now, keeping the limit.
    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn exceeded(&self) -> bool {
        self.elapsed() >= self.limit
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spent_budget_is_exceeded() {
        let budget = TimeBudget::spent();
        assert!(budget.exceeded());
        assert_eq!(budget.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_restart_keeps_the_limit() {
        let mut spent = TimeBudget::spent();
        spent.restart();
        assert!(spent.exceeded());

        let mut budget = TimeBudget::from_secs(3600);
        budget.restart();
        assert!(!budget.exceeded());
    }

    #[test]
    fn test_fresh_budget_is_not_exceeded() {
        let budget = TimeBudget::from_secs(3600);
        assert!(!budget.exceeded());
        assert!(budget.remaining() > Duration::from_secs(3500));
    }
}
