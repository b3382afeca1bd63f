use chrono::Utc;
use tracing::{info, warn};

use super::JobTally;
use crate::database::models::{NotificationKind, Subscription};
use crate::database::repository::subscriptions;
use crate::services::{NotificationService, ServiceError};
use crate::state::AppState;

pub(super) async fn run(state: &AppState, tally: &mut JobTally) -> Result<(), ServiceError> {
    let now = Utc::now();
    let due = subscriptions::due_for_expiry(state.pool(), now, state.config().jobs.renewal_batch_size).await?;

    for subscription in due {
        match expire_one(state, &subscription).await {
            Ok(true) => tally.success(),
            Ok(false) => tally.untouched(),
            Err(e) => {
                warn!(subscription_id = %subscription.id, error = %e, "failed to expire subscription");
                tally.failure();
            }
        }
    }
    Ok(())
}

/// False when the row moved on since it was selected
async fn expire_one(state: &AppState, subscription: &Subscription) -> Result<bool, ServiceError> {
    let now = Utc::now();
    let mut tx = state.pool().begin().await?;

    let Some(expired) = subscriptions::expire(&mut *tx, subscription.id, subscription.status, now).await? else {
        return Ok(false);
    };
    NotificationService::notify(
        &mut *tx,
        expired.user_id,
        NotificationKind::SubscriptionExpired,
        "Subscription expired",
        "Your subscription period has ended.",
    )
    .await?;
    tx.commit().await?;

    info!(subscription_id = %expired.id, from = %subscription.status, "subscription expired");
    Ok(true)
}
