//! Subscription state machine.
//!
//! ```text
//! PENDING ──approved──> ACTIVE ──cancel──> CANCELLED
//!    │                   │  ▲                  │
//!    │                   │  └──reactivate──────┤
//!    └──declined──> CANCELLED                  │
//!                        └──period over──> EXPIRED <──┘
//! ```
//!
//! `ACTIVE -> ACTIVE` covers renewals and plan changes.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::database::models::SubscriptionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("subscription cannot move from {from} to {to}")]
pub struct LifecycleError {
    pub from: SubscriptionStatus,
    pub to: SubscriptionStatus,
}

pub fn can_transition(from: SubscriptionStatus, to: SubscriptionStatus) -> bool {
    use SubscriptionStatus::*;

    matches!(
        (from, to),
        (Pending, Active)
            | (Pending, Cancelled)
            | (Active, Active)
            | (Active, Cancelled)
            | (Active, Expired)
            | (Cancelled, Active)
            | (Cancelled, Expired)
    )
}

pub fn ensure_transition(from: SubscriptionStatus, to: SubscriptionStatus) -> Result<(), LifecycleError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(LifecycleError { from, to })
    }
}

/// Live subscriptions count against the one-per-user rule.
pub fn is_live(status: SubscriptionStatus) -> bool {
    matches!(status, SubscriptionStatus::Pending | SubscriptionStatus::Active)
}

/// Whether the holder currently gets the plan's benefits.
///
/// An ACTIVE subscription past its end date is still in the renewal retry
/// window and keeps its benefits until a job expires it.
pub fn is_entitled(status: SubscriptionStatus, end_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match status {
        SubscriptionStatus::Active => true,
        SubscriptionStatus::Cancelled => end_date > now,
        SubscriptionStatus::Pending | SubscriptionStatus::Expired => false,
    }
}
