use chrono::{DateTime, Duration, Utc};

/// Renewal retry policy: how long to wait after each failed attempt and when
/// to give up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_days: Vec<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_days: vec![1, 3, 7],
        }
    }
}

impl RetryPolicy {
    pub fn from_config(billing: &crate::config::BillingConfig) -> Self {
        Self {
            max_retries: billing.max_payment_retries,
            backoff_days: billing.retry_backoff_days.clone(),
        }
    }

    /// When to try again after a failed renewal, given how many attempts had
    /// already failed before it. `None` once `attempts_so_far` reaches
    /// `max_retries`: the caller gives up.
    ///
    /// Attempts beyond the schedule reuse its last entry.
    pub fn next_retry_at(&self, attempts_so_far: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_exhausted(attempts_so_far) {
            return None;
        }
        let days = self
            .backoff_days
            .get(attempts_so_far as usize)
            .or_else(|| self.backoff_days.last())
            .copied()
            .unwrap_or(1);

        Some(now + Duration::days(i64::from(days)))
    }

    pub fn is_exhausted(&self, attempts_so_far: u32) -> bool {
        attempts_so_far >= self.max_retries
    }
}
