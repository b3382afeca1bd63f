use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::billing::ensure_transition;
use crate::database::models::{NotificationKind, Payment, SubscriptionDetails, SubscriptionStatus};
use crate::database::repository::payments::{self, PaymentFilter};
use crate::database::repository::subscriptions::{self, SubscriptionFilter};
use crate::database::repository::{Page, Pagination};
use crate::services::subscription_service::with_plan;
use crate::services::{NotificationService, ServiceError};

const MAX_EXTENSION_DAYS: i32 = 3650;

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub subscriptions_by_status: BTreeMap<String, i64>,
    /// Active subscription count keyed by plan slug
    pub active_by_plan: BTreeMap<String, i64>,
    pub total_revenue: Decimal,
    pub revenue_last_30_days: Decimal,
    pub failed_payments_last_30_days: i64,
}

/// Back-office operations on any user's subscriptions and payments
pub struct AdminService {
    pool: PgPool,
}

impl AdminService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
        pagination: Pagination,
    ) -> Result<Page<SubscriptionDetails>, ServiceError> {
        let now = Utc::now();
        let rows = subscriptions::list(&self.pool, &filter, pagination).await?;
        let total = subscriptions::count(&self.pool, &filter).await?;

        let mut items = Vec::with_capacity(rows.len());
        for subscription in rows {
            items.push(with_plan(&self.pool, subscription, now).await?);
        }
        Ok(Page::new(items, total, pagination))
    }

    pub async fn get_subscription(&self, id: Uuid) -> Result<SubscriptionDetails, ServiceError> {
        let subscription = subscriptions::find(&self.pool, id)
            .await?
            .ok_or_else(|| subscription_not_found(id))?;
        with_plan(&self.pool, subscription, Utc::now()).await
    }

    /// Push the end date out by `days`. Expired subscriptions stay expired.
    pub async fn extend_subscription(&self, id: Uuid, days: i32) -> Result<SubscriptionDetails, ServiceError> {
        if !(1..=MAX_EXTENSION_DAYS).contains(&days) {
            return Err(ServiceError::validation(format!(
                "days must be between 1 and {MAX_EXTENSION_DAYS}"
            )));
        }

        let current = subscriptions::find(&self.pool, id)
            .await?
            .ok_or_else(|| subscription_not_found(id))?;
        if current.status == SubscriptionStatus::Expired {
            return Err(ServiceError::conflict("An expired subscription cannot be extended"));
        }

        let extended = subscriptions::extend(&self.pool, id, days)
            .await?
            .ok_or_else(|| ServiceError::conflict("An expired subscription cannot be extended"))?;

        info!(subscription_id = %id, days, end_date = %extended.end_date, "subscription extended by admin");
        with_plan(&self.pool, extended, Utc::now()).await
    }

    /// End a subscription now, whatever state it is in
    pub async fn force_expire(&self, id: Uuid) -> Result<SubscriptionDetails, ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let current = subscriptions::find_for_update(&mut *tx, id, false)
            .await?
            .ok_or_else(|| subscription_not_found(id))?;
        if current.status == SubscriptionStatus::Expired {
            return Err(ServiceError::conflict("Subscription is already expired"));
        }

        let closed = if current.status == SubscriptionStatus::Pending {
            // A pending subscription never started; close it as cancelled.
            let cancelled = subscriptions::cancel(&mut *tx, id, current.status, now, Some(now)).await?;
            payments::fail_pending_for_subscription(&mut *tx, id, "expired by admin", now).await?;
            cancelled
        } else {
            ensure_transition(current.status, SubscriptionStatus::Expired)?;
            subscriptions::expire(&mut *tx, id, current.status, now).await?
        };
        let expired = closed.ok_or_else(|| ServiceError::conflict("Subscription changed concurrently"))?;

        NotificationService::notify(
            &mut *tx,
            expired.user_id,
            NotificationKind::SubscriptionExpired,
            "Subscription ended",
            "Your subscription was ended by an administrator.",
        )
        .await?;
        tx.commit().await?;

        info!(subscription_id = %id, from = %current.status, to = %expired.status, "subscription force-expired by admin");
        with_plan(&self.pool, expired, now).await
    }

    pub async fn cancel_subscription(&self, id: Uuid) -> Result<SubscriptionDetails, ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let current = subscriptions::find_for_update(&mut *tx, id, false)
            .await?
            .ok_or_else(|| subscription_not_found(id))?;
        ensure_transition(current.status, SubscriptionStatus::Cancelled)?;

        let end_date = (current.status == SubscriptionStatus::Pending).then_some(now);
        let cancelled = subscriptions::cancel(&mut *tx, id, current.status, now, end_date)
            .await?
            .ok_or_else(|| ServiceError::conflict("Subscription changed concurrently"))?;
        if current.status == SubscriptionStatus::Pending {
            payments::fail_pending_for_subscription(&mut *tx, id, "cancelled by admin", now).await?;
        }

        NotificationService::notify(
            &mut *tx,
            cancelled.user_id,
            NotificationKind::SubscriptionCancelled,
            "Subscription cancelled",
            &format!(
                "Your subscription was cancelled by an administrator and ends on {}.",
                cancelled.end_date.date_naive()
            ),
        )
        .await?;
        tx.commit().await?;

        info!(subscription_id = %id, "subscription cancelled by admin");
        with_plan(&self.pool, cancelled, now).await
    }

    pub async fn list_payments(&self, filter: PaymentFilter, pagination: Pagination) -> Result<Page<Payment>, ServiceError> {
        let items = payments::list(&self.pool, &filter, pagination).await?;
        let total = payments::count(&self.pool, &filter).await?;
        Ok(Page::new(items, total, pagination))
    }

    pub async fn refund_payment(&self, id: Uuid) -> Result<Payment, ServiceError> {
        if let Some(refunded) = payments::refund(&self.pool, id, Utc::now()).await? {
            info!(payment_id = %id, amount = %refunded.amount, "payment refunded");
            return Ok(refunded);
        }

        match payments::find(&self.pool, id).await? {
            Some(payment) => Err(ServiceError::conflict(format!(
                "Only completed payments can be refunded (current status {})",
                payment.status
            ))),
            None => Err(ServiceError::not_found(format!("Payment {id} not found"))),
        }
    }

    pub async fn stats(&self) -> Result<AdminStats, ServiceError> {
        let since = Utc::now() - Duration::days(30);

        let mut subscriptions_by_status: BTreeMap<String, i64> = SubscriptionStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        for (status, count) in subscriptions::count_by_status(&self.pool).await? {
            subscriptions_by_status.insert(status.as_str().to_string(), count);
        }

        let active_by_plan = subscriptions::active_by_plan(&self.pool).await?.into_iter().collect();
        let revenue = payments::revenue_summary(&self.pool, since).await?;

        Ok(AdminStats {
            subscriptions_by_status,
            active_by_plan,
            total_revenue: revenue.total_revenue,
            revenue_last_30_days: revenue.revenue_last_30_days,
            failed_payments_last_30_days: revenue.failed_last_30_days,
        })
    }
}

fn subscription_not_found(id: Uuid) -> ServiceError {
    ServiceError::not_found(format!("Subscription {id} not found"))
}
