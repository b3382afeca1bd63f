use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::JobTally;
use crate::database::models::{Subscription, SubscriptionStatus};
use crate::database::repository::{payments, subscriptions};
use crate::services::ServiceError;
use crate::state::AppState;

const ABANDONED: &str = "abandoned";

pub(super) async fn run(state: &AppState, tally: &mut JobTally) -> Result<(), ServiceError> {
    let now = Utc::now();
    let cutoff = now - Duration::hours(state.config().billing.pending_timeout_hours);

    for subscription in subscriptions::stale_pending(state.pool(), cutoff).await? {
        match cancel_one(state, &subscription).await {
            Ok(true) => tally.success(),
            Ok(false) => tally.untouched(),
            Err(e) => {
                warn!(subscription_id = %subscription.id, error = %e, "failed to clean up pending subscription");
                tally.failure();
            }
        }
    }

    // Renewal charges that never got an answer have no pending subscription.
    let orphaned = payments::fail_stale_pending(state.pool(), cutoff, ABANDONED, now).await?;
    if orphaned > 0 {
        info!(count = orphaned, "failed abandoned pending payments");
    }
    Ok(())
}

async fn cancel_one(state: &AppState, subscription: &Subscription) -> Result<bool, ServiceError> {
    let now = Utc::now();
    let mut tx = state.pool().begin().await?;

    let cancelled = subscriptions::cancel(&mut *tx, subscription.id, SubscriptionStatus::Pending, now, Some(now)).await?;
    if cancelled.is_none() {
        return Ok(false);
    }
    let failed = payments::fail_pending_for_subscription(&mut *tx, subscription.id, ABANDONED, now).await?;
    tx.commit().await?;

    info!(subscription_id = %subscription.id, payments_failed = failed, "abandoned pending subscription cancelled");
    Ok(true)
}
