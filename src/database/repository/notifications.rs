use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Notification, NotificationKind};

pub async fn insert<'e, E>(
    executor: E,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    body: &str,
) -> Result<Notification, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let notification = sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (user_id, kind, title, body)
         VALUES ($1, $2, $3, $4)
         RETURNING id, user_id, kind, title, body, read_at, created_at",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(title)
    .bind(body)
    .fetch_one(executor)
    .await?;
    Ok(notification)
}

/// Delete notifications read before `cutoff`; returns the count
pub async fn purge_read_before<'e, E>(executor: E, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM notifications WHERE read_at IS NOT NULL AND read_at < $1")
        .bind(cutoff)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
