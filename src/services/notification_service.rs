use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::database::models::NotificationKind;
use crate::database::repository::notifications;
use crate::services::ServiceError;

/// In-app notifications written by the subscription engine
pub struct NotificationService;

impl NotificationService {
    /// Record a notification. Callers pass their transaction so the message
    /// commits or rolls back together with the state change it describes.
    pub async fn notify<'e, E>(
        executor: E,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) -> Result<(), ServiceError>
    where
        E: PgExecutor<'e>,
    {
        let notification = notifications::insert(executor, user_id, kind, title, body).await?;
        debug!(notification_id = %notification.id, %user_id, kind = kind.as_str(), "notification queued");
        Ok(())
    }

    pub async fn purge_read_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, ServiceError> {
        let purged = notifications::purge_read_before(pool, cutoff).await?;
        Ok(purged)
    }
}
