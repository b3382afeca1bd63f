use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Subscription, SubscriptionStatus};

use super::Pagination;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, status, auto_renew, start_date, end_date, cancelled_at, \
                                    renewal_attempts, next_retry_at, created_at, updated_at";

pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub status: Option<SubscriptionStatus>,
    pub user_id: Option<Uuid>,
}

pub async fn insert<'e, E>(executor: E, new: &NewSubscription) -> Result<Subscription, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO subscriptions (user_id, plan_id, status, auto_renew, start_date, end_date)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(new.user_id)
        .bind(new.plan_id)
        .bind(new.status)
        .bind(new.auto_renew)
        .bind(new.start_date)
        .bind(new.end_date)
        .fetch_one(executor)
        .await?;
    Ok(subscription)
}

pub async fn find<'e, E>(executor: E, id: Uuid) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1");
    let subscription = sqlx::query_as::<_, Subscription>(&sql).bind(id).fetch_optional(executor).await?;
    Ok(subscription)
}

/// Lock a subscription row for the rest of the transaction. With
/// `skip_locked`, a row another worker holds yields `None` instead of waiting.
///
/// NO KEY UPDATE leaves foreign key checks from other connections unblocked,
/// so a payment row can be inserted for this subscription while it is held.
pub async fn find_for_update<'e, E>(executor: E, id: Uuid, skip_locked: bool) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let lock = if skip_locked { "FOR NO KEY UPDATE SKIP LOCKED" } else { "FOR NO KEY UPDATE" };
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1 {lock}");
    let subscription = sqlx::query_as::<_, Subscription>(&sql).bind(id).fetch_optional(executor).await?;
    Ok(subscription)
}

/// Most recent subscription that has not expired
pub async fn current_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE user_id = $1 AND status <> 'EXPIRED'
         ORDER BY created_at DESC
         LIMIT 1"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql).bind(user_id).fetch_optional(executor).await?;
    Ok(subscription)
}

/// The user's PENDING or ACTIVE subscription, locked for update
pub async fn live_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE user_id = $1 AND status IN ('PENDING', 'ACTIVE')
         FOR NO KEY UPDATE"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql).bind(user_id).fetch_optional(executor).await?;
    Ok(subscription)
}

/// The user's CANCELLED subscription that still has time left, locked
pub async fn cancelled_with_time_left<'e, E>(
    executor: E,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE user_id = $1 AND status = 'CANCELLED' AND end_date > $2
         ORDER BY end_date DESC
         LIMIT 1
         FOR NO KEY UPDATE"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(user_id)
        .bind(now)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

/// PENDING -> ACTIVE with a fresh period
pub async fn activate<'e, E>(
    executor: E,
    id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET
            status = 'ACTIVE', start_date = $2, end_date = $3, updated_at = NOW()
         WHERE id = $1 AND status = 'PENDING'
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

/// Move to CANCELLED from `from`. `end_date` cuts the period short when given.
pub async fn cancel<'e, E>(
    executor: E,
    id: Uuid,
    from: SubscriptionStatus,
    now: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET
            status = 'CANCELLED',
            auto_renew = FALSE,
            cancelled_at = $3,
            end_date = GREATEST(start_date, COALESCE($4, end_date)),
            next_retry_at = NULL,
            updated_at = NOW()
         WHERE id = $1 AND status = $2
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(from)
        .bind(now)
        .bind(end_date)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

/// CANCELLED -> ACTIVE while the period is still running
pub async fn reactivate<'e, E>(executor: E, id: Uuid, now: DateTime<Utc>) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET
            status = 'ACTIVE', auto_renew = TRUE, cancelled_at = NULL, updated_at = NOW()
         WHERE id = $1 AND status = 'CANCELLED' AND end_date > $2
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(now)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

pub async fn set_auto_renew<'e, E>(executor: E, id: Uuid, enabled: bool) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET auto_renew = $2, updated_at = NOW()
         WHERE id = $1 AND status = 'ACTIVE'
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(enabled)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

/// Swap plan and restart the period; clears any renewal retry state
pub async fn change_plan<'e, E>(
    executor: E,
    id: Uuid,
    plan_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET
            plan_id = $2, start_date = $3, end_date = $4,
            renewal_attempts = 0, next_retry_at = NULL, updated_at = NOW()
         WHERE id = $1 AND status = 'ACTIVE'
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(plan_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

pub async fn record_renewal<'e, E>(executor: E, id: Uuid, end_date: DateTime<Utc>) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET
            end_date = $2, renewal_attempts = 0, next_retry_at = NULL, updated_at = NOW()
         WHERE id = $1 AND status = 'ACTIVE'
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(end_date)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

pub async fn record_renewal_failure<'e, E>(
    executor: E,
    id: Uuid,
    attempts: i32,
    next_retry_at: DateTime<Utc>,
) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET
            renewal_attempts = $2, next_retry_at = $3, updated_at = NOW()
         WHERE id = $1 AND status = 'ACTIVE'
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(attempts)
        .bind(next_retry_at)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

/// Move to EXPIRED from `from`, closing the period at `now` at the latest
pub async fn expire<'e, E>(
    executor: E,
    id: Uuid,
    from: SubscriptionStatus,
    now: DateTime<Utc>,
) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET
            status = 'EXPIRED',
            auto_renew = FALSE,
            end_date = GREATEST(start_date, LEAST(end_date, $3)),
            next_retry_at = NULL,
            updated_at = NOW()
         WHERE id = $1 AND status = $2
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(from)
        .bind(now)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

pub async fn extend<'e, E>(executor: E, id: Uuid, days: i32) -> Result<Option<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET
            end_date = end_date + make_interval(days => $2), updated_at = NOW()
         WHERE id = $1 AND status <> 'EXPIRED'
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let subscription = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .bind(days)
        .fetch_optional(executor)
        .await?;
    Ok(subscription)
}

/// Subscriptions whose period is over and that will not renew
pub async fn due_for_expiry<'e, E>(executor: E, now: DateTime<Utc>, limit: i64) -> Result<Vec<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE end_date <= $1
           AND (status = 'CANCELLED' OR (status = 'ACTIVE' AND auto_renew = FALSE))
         ORDER BY end_date ASC
         LIMIT $2"
    );
    let subscriptions = sqlx::query_as::<_, Subscription>(&sql)
        .bind(now)
        .bind(limit)
        .fetch_all(executor)
        .await?;
    Ok(subscriptions)
}

/// Ids of auto-renewing subscriptions that end before `horizon` and are not
/// waiting out a retry backoff
pub async fn due_for_renewal<'e, E>(
    executor: E,
    now: DateTime<Utc>,
    horizon: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Uuid>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM subscriptions
         WHERE status = 'ACTIVE'
           AND auto_renew = TRUE
           AND end_date <= $2
           AND (next_retry_at IS NULL OR next_retry_at <= $1)
         ORDER BY end_date ASC
         LIMIT $3",
    )
    .bind(now)
    .bind(horizon)
    .bind(limit)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// PENDING subscriptions created before `cutoff`
pub async fn stale_pending<'e, E>(executor: E, cutoff: DateTime<Utc>) -> Result<Vec<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE status = 'PENDING' AND created_at < $1
         ORDER BY created_at ASC"
    );
    let subscriptions = sqlx::query_as::<_, Subscription>(&sql).bind(cutoff).fetch_all(executor).await?;
    Ok(subscriptions)
}

pub async fn list<'e, E>(
    executor: E,
    filter: &SubscriptionFilter,
    pagination: Pagination,
) -> Result<Vec<Subscription>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE ($1::subscription_status IS NULL OR status = $1)
           AND ($2::uuid IS NULL OR user_id = $2)
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4"
    );
    let subscriptions = sqlx::query_as::<_, Subscription>(&sql)
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(executor)
        .await?;
    Ok(subscriptions)
}

pub async fn count<'e, E>(executor: E, filter: &SubscriptionFilter) -> Result<i64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM subscriptions
         WHERE ($1::subscription_status IS NULL OR status = $1)
           AND ($2::uuid IS NULL OR user_id = $2)",
    )
    .bind(filter.status)
    .bind(filter.user_id)
    .fetch_one(executor)
    .await?;
    Ok(total)
}

pub async fn count_by_status<'e, E>(executor: E) -> Result<Vec<(SubscriptionStatus, i64)>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(SubscriptionStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM subscriptions GROUP BY status ORDER BY status")
            .fetch_all(executor)
            .await?;
    Ok(rows)
}

/// Active subscription counts per plan slug
pub async fn active_by_plan<'e, E>(executor: E) -> Result<Vec<(String, i64)>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT p.slug, COUNT(s.id)
         FROM subscription_plans p
         LEFT JOIN subscriptions s ON s.plan_id = p.id AND s.status = 'ACTIVE'
         GROUP BY p.slug
         ORDER BY p.slug",
    )
    .fetch_all(executor)
    .await?;
    Ok(rows)
}
