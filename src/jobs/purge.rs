use chrono::{Duration, Utc};

use super::JobTally;
use crate::services::{NotificationService, ServiceError};
use crate::state::AppState;

pub(super) async fn run(state: &AppState, tally: &mut JobTally) -> Result<(), ServiceError> {
    let cutoff = Utc::now() - Duration::days(state.config().jobs.notification_retention_days);
    let purged = NotificationService::purge_read_before(state.pool(), cutoff).await?;

    tally.processed += purged;
    tally.succeeded += purged;
    Ok(())
}
