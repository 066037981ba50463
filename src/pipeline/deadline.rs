use crate::error::TimeoutError;
use std::time::{Duration, Instant};

/// A point in time after which a run is abandoned.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    /// Fails once the budget is used up. A zero budget is always expired.
    pub fn check(&self) -> Result<(), TimeoutError> {
        if self.budget.is_zero() || self.start.elapsed() >= self.budget {
            Err(TimeoutError {
                budget: self.budget,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_expired() {
        let err = Deadline::after(Duration::ZERO).check().unwrap_err();
        assert_eq!(err.budget, Duration::ZERO);
    }

    #[test]
    fn test_generous_budget_ok() {
        let deadline = Deadline::after(Duration::from_secs(3600));
        assert!(deadline.check().is_ok());
        assert!(deadline.remaining() > Duration::from_secs(3500));
    }
}
