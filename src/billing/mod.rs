//! Billing rules for the subscription engine.
//!
//! Everything here is free of I/O apart from the processor trait, so the
//! services can lean on these functions for the arithmetic and state checks.

pub mod lifecycle;
pub mod processor;
pub mod proration;
pub mod retry;

pub use lifecycle::{can_transition, ensure_transition, is_entitled, is_live, LifecycleError};
pub use processor::{ChargeOutcome, ChargeRequest, PaymentProcessor, ProcessorError, SimulatedProcessor};
pub use proration::{quote, ProrationQuote};
pub use retry::RetryPolicy;

use chrono::{DateTime, Duration, Utc};

/// End of a renewed period: renewals stack on the current end date, but a
/// lapsed subscription restarts from `now`.
pub fn extend_period(current_end: DateTime<Utc>, now: DateTime<Utc>, duration_days: i32) -> DateTime<Utc> {
    current_end.max(now) + Duration::days(i64::from(duration_days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renewal_stacks_on_future_end() {
        let now = Utc::now();
        let end = now + Duration::days(2);
        assert_eq!(extend_period(end, now, 30), end + Duration::days(30));
    }

    #[test]
    fn lapsed_renewal_restarts_from_now() {
        let now = Utc::now();
        let end = now - Duration::days(5);
        assert_eq!(extend_period(end, now, 30), now + Duration::days(30));
    }
}
