use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Payment, PaymentPurpose, PaymentStatus};

use super::Pagination;

const PAYMENT_COLUMNS: &str = "id, user_id, subscription_id, amount, currency, status, purpose, provider, \
                               transaction_id, failure_reason, created_at, processed_at, refunded_at";

pub struct NewPayment<'a> {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: &'a str,
    pub purpose: PaymentPurpose,
    pub provider: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub user_id: Option<Uuid>,
}

/// Revenue figures for the admin dashboard
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RevenueSummary {
    pub total_revenue: Decimal,
    pub revenue_last_30_days: Decimal,
    pub failed_last_30_days: i64,
}

pub async fn insert_pending<'e, E>(executor: E, new: &NewPayment<'_>) -> Result<Payment, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO payments (user_id, subscription_id, amount, currency, status, purpose, provider)
         VALUES ($1, $2, $3, $4, 'PENDING', $5, $6)
         RETURNING {PAYMENT_COLUMNS}"
    );
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(new.user_id)
        .bind(new.subscription_id)
        .bind(new.amount)
        .bind(new.currency)
        .bind(new.purpose)
        .bind(new.provider)
        .fetch_one(executor)
        .await?;
    Ok(payment)
}

pub async fn find<'e, E>(executor: E, id: Uuid) -> Result<Option<Payment>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
    let payment = sqlx::query_as::<_, Payment>(&sql).bind(id).fetch_optional(executor).await?;
    Ok(payment)
}

pub async fn mark_completed<'e, E>(
    executor: E,
    id: Uuid,
    transaction_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Payment>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE payments SET status = 'COMPLETED', transaction_id = $2, processed_at = $3
         WHERE id = $1 AND status = 'PENDING'
         RETURNING {PAYMENT_COLUMNS}"
    );
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .bind(transaction_id)
        .bind(now)
        .fetch_optional(executor)
        .await?;
    Ok(payment)
}

pub async fn mark_failed<'e, E>(
    executor: E,
    id: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Option<Payment>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE payments SET status = 'FAILED', failure_reason = $2, processed_at = $3
         WHERE id = $1 AND status = 'PENDING'
         RETURNING {PAYMENT_COLUMNS}"
    );
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .bind(reason)
        .bind(now)
        .fetch_optional(executor)
        .await?;
    Ok(payment)
}

/// Fail every PENDING payment attached to a subscription; returns the count
pub async fn fail_pending_for_subscription<'e, E>(
    executor: E,
    subscription_id: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<u64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE payments SET status = 'FAILED', failure_reason = $2, processed_at = $3
         WHERE subscription_id = $1 AND status = 'PENDING'",
    )
    .bind(subscription_id)
    .bind(reason)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Fail PENDING payments created before `cutoff`, whatever they belong to
pub async fn fail_stale_pending<'e, E>(
    executor: E,
    cutoff: DateTime<Utc>,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<u64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE payments SET status = 'FAILED', failure_reason = $2, processed_at = $3
         WHERE status = 'PENDING' AND created_at < $1",
    )
    .bind(cutoff)
    .bind(reason)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// COMPLETED -> REFUNDED; `None` when the payment is in any other state
pub async fn refund<'e, E>(executor: E, id: Uuid, now: DateTime<Utc>) -> Result<Option<Payment>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE payments SET status = 'REFUNDED', refunded_at = $2
         WHERE id = $1 AND status = 'COMPLETED'
         RETURNING {PAYMENT_COLUMNS}"
    );
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .bind(now)
        .fetch_optional(executor)
        .await?;
    Ok(payment)
}

/// Settle a charge the processor approved after its payment stopped being
/// wanted. The transaction id is kept and the row lands in REFUNDED, also when
/// a concurrent cancel already failed it.
pub async fn refund_approved<'e, E>(
    executor: E,
    id: Uuid,
    transaction_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Payment>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE payments SET
            status = 'REFUNDED', transaction_id = $2, processed_at = $3, refunded_at = $3
         WHERE id = $1 AND status IN ('PENDING', 'FAILED')
         RETURNING {PAYMENT_COLUMNS}"
    );
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .bind(transaction_id)
        .bind(now)
        .fetch_optional(executor)
        .await?;
    Ok(payment)
}

pub async fn list<'e, E>(executor: E, filter: &PaymentFilter, pagination: Pagination) -> Result<Vec<Payment>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments
         WHERE ($1::payment_status IS NULL OR status = $1)
           AND ($2::uuid IS NULL OR user_id = $2)
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4"
    );
    let payments = sqlx::query_as::<_, Payment>(&sql)
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(executor)
        .await?;
    Ok(payments)
}

pub async fn count<'e, E>(executor: E, filter: &PaymentFilter) -> Result<i64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM payments
         WHERE ($1::payment_status IS NULL OR status = $1)
           AND ($2::uuid IS NULL OR user_id = $2)",
    )
    .bind(filter.status)
    .bind(filter.user_id)
    .fetch_one(executor)
    .await?;
    Ok(total)
}

pub async fn revenue_summary<'e, E>(executor: E, since: DateTime<Utc>) -> Result<RevenueSummary, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let summary = sqlx::query_as::<_, RevenueSummary>(
        "SELECT
            COALESCE(SUM(amount) FILTER (WHERE status = 'COMPLETED'), 0) AS total_revenue,
            COALESCE(SUM(amount) FILTER (WHERE status = 'COMPLETED' AND processed_at >= $1), 0) AS revenue_last_30_days,
            COUNT(*) FILTER (WHERE status = 'FAILED' AND created_at >= $1) AS failed_last_30_days
         FROM payments",
    )
    .bind(since)
    .fetch_one(executor)
    .await?;
    Ok(summary)
}
