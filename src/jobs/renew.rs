use chrono::{Duration, Utc};
use tracing::warn;

use super::JobTally;
use crate::database::repository::subscriptions;
use crate::services::{RenewalOutcome, ServiceError};
use crate::state::AppState;

pub(super) async fn run(state: &AppState, tally: &mut JobTally) -> Result<(), ServiceError> {
    let now = Utc::now();
    let horizon = now + Duration::hours(state.config().billing.renewal_window_hours);
    let due = subscriptions::due_for_renewal(state.pool(), now, horizon, state.config().jobs.renewal_batch_size).await?;

    let service = state.subscriptions();
    for subscription_id in due {
        match service.renew(subscription_id).await {
            Ok(RenewalOutcome::Renewed { .. }) => tally.success(),
            Ok(RenewalOutcome::RetryScheduled { .. } | RenewalOutcome::Expired { .. }) => tally.failure(),
            Ok(RenewalOutcome::Skipped { .. }) => tally.untouched(),
            Err(e) => {
                warn!(%subscription_id, error = %e, "renewal errored");
                tally.failure();
            }
        }
    }
    Ok(())
}
