//! Subscription lifecycle engine.
//!
//! Charges never run inside a database transaction. Each paid operation
//! commits a PENDING payment first, calls the processor, then finalizes the
//! payment and the subscription in a second transaction.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::{
    self, ensure_transition, is_entitled, ChargeOutcome, ChargeRequest, PaymentProcessor, ProcessorError,
    ProrationQuote, RetryPolicy,
};
use crate::config::BillingConfig;
use crate::database::models::{
    NotificationKind, Payment, PaymentPurpose, Subscription, SubscriptionDetails, SubscriptionPlan, SubscriptionStatus,
};
use crate::database::repository::payments::{self, NewPayment, PaymentFilter};
use crate::database::repository::subscriptions::{self, NewSubscription};
use crate::database::repository::{plans, users, Page, Pagination};
use crate::database::DatabaseError;
use crate::services::{NotificationService, ServiceError};

const LIVE_SUBSCRIPTION_INDEX: &str = "subscriptions_one_live_per_user";

/// What a single renewal attempt did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RenewalOutcome {
    Renewed {
        subscription_id: Uuid,
        new_end_date: DateTime<Utc>,
        payment_id: Option<Uuid>,
    },
    RetryScheduled {
        subscription_id: Uuid,
        attempts: i32,
        next_retry_at: DateTime<Utc>,
    },
    Expired {
        subscription_id: Uuid,
    },
    Skipped {
        subscription_id: Uuid,
        reason: String,
    },
}

impl RenewalOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RenewalOutcome::Skipped { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RenewalOutcome::Renewed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingQuota {
    /// Slug of the entitling plan; `None` on the free tier
    pub plan: Option<String>,
    /// `None` means unlimited
    pub max_listings: Option<i64>,
    pub used_listings: i64,
    pub remaining: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanChange {
    pub subscription: SubscriptionDetails,
    pub quote: ProrationQuote,
    pub payment: Option<Payment>,
}

#[derive(Clone)]
pub struct SubscriptionService {
    pool: PgPool,
    processor: Arc<dyn PaymentProcessor>,
    free_tier_listings: i64,
    retry: RetryPolicy,
}

impl SubscriptionService {
    pub fn new(pool: PgPool, processor: Arc<dyn PaymentProcessor>, billing: &BillingConfig) -> Self {
        Self {
            pool,
            processor,
            free_tier_listings: billing.free_tier_listings,
            retry: RetryPolicy::from_config(billing),
        }
    }

    /// Active plans, cheapest first
    pub async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>, ServiceError> {
        Ok(plans::list(&self.pool, false).await?)
    }

    /// The user's latest subscription that has not expired
    pub async fn current(&self, user_id: Uuid) -> Result<Option<SubscriptionDetails>, ServiceError> {
        match subscriptions::current_for_user(&self.pool, user_id).await? {
            Some(subscription) => Ok(Some(with_plan(&self.pool, subscription, Utc::now()).await?)),
            None => Ok(None),
        }
    }

    pub async fn subscribe(&self, user_id: Uuid, plan_id: Uuid) -> Result<SubscriptionDetails, ServiceError> {
        let plan = plans::find(&self.pool, plan_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Plan {plan_id} not found")))?;
        if !plan.is_active {
            return Err(ServiceError::validation(format!("Plan '{}' is not available", plan.slug)));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !users::lock(&mut *tx, user_id).await? {
            return Err(ServiceError::not_found(format!("User {user_id} not found")));
        }

        // A cancelled subscription with time left is replaced by the new one.
        if let Some(previous) = subscriptions::cancelled_with_time_left(&mut *tx, user_id, now).await? {
            subscriptions::expire(&mut *tx, previous.id, SubscriptionStatus::Cancelled, now).await?;
            info!(subscription_id = %previous.id, %user_id, "expired cancelled subscription replaced by new subscribe");
        }

        if subscriptions::live_for_user(&mut *tx, user_id).await?.is_some() {
            return Err(live_subscription_exists());
        }

        let new = NewSubscription {
            user_id,
            plan_id: plan.id,
            status: if plan.is_free() {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::Pending
            },
            auto_renew: true,
            start_date: now,
            end_date: period_end(now, &plan),
        };
        let subscription = subscriptions::insert(&mut *tx, &new).await.map_err(live_conflict)?;

        if plan.is_free() {
            NotificationService::notify(
                &mut *tx,
                user_id,
                NotificationKind::SubscriptionActivated,
                "Subscription active",
                &format!("Your {} plan is active until {}.", plan.name, subscription.end_date.date_naive()),
            )
            .await?;
            tx.commit().await?;
            info!(subscription_id = %subscription.id, %user_id, plan = %plan.slug, "free subscription activated");
            return Ok(details(subscription, plan, now));
        }

        let payment = payments::insert_pending(
            &mut *tx,
            &NewPayment {
                user_id,
                subscription_id: Some(subscription.id),
                amount: plan.price,
                currency: &plan.currency,
                purpose: PaymentPurpose::Initial,
                provider: self.processor.name(),
            },
        )
        .await?;
        tx.commit().await?;

        let outcome = self.charge(&payment).await;
        let finalized_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        match outcome {
            Ok(ChargeOutcome::Approved { transaction_id }) => {
                let activated =
                    subscriptions::activate(&mut *tx, subscription.id, finalized_at, period_end(finalized_at, &plan))
                        .await?;
                let Some(activated) = activated else {
                    // Cancelled mid-charge; the approved transaction stays on record.
                    payments::refund_approved(&mut *tx, payment.id, &transaction_id, finalized_at).await?;
                    tx.commit().await?;
                    warn!(subscription_id = %subscription.id, payment_id = %payment.id, %transaction_id, "subscription left PENDING during charge, payment refunded");
                    return Err(ServiceError::conflict("Subscription changed while the payment was being processed"));
                };
                payments::mark_completed(&mut *tx, payment.id, &transaction_id, finalized_at).await?;
                NotificationService::notify(
                    &mut *tx,
                    user_id,
                    NotificationKind::SubscriptionActivated,
                    "Subscription active",
                    &format!("Your {} plan is active until {}.", plan.name, activated.end_date.date_naive()),
                )
                .await?;
                tx.commit().await?;
                info!(subscription_id = %activated.id, %user_id, plan = %plan.slug, "subscription activated");
                Ok(details(activated, plan, finalized_at))
            }
            Ok(ChargeOutcome::Declined { reason }) => {
                self.abandon_initial(&mut tx, &subscription, &payment, &plan, &reason, finalized_at)
                    .await?;
                tx.commit().await?;
                warn!(subscription_id = %subscription.id, %user_id, %reason, "initial payment declined");
                Err(ServiceError::PaymentDeclined(reason))
            }
            Err(err) => {
                self.abandon_initial(&mut tx, &subscription, &payment, &plan, &err.to_string(), finalized_at)
                    .await?;
                tx.commit().await?;
                warn!(subscription_id = %subscription.id, %user_id, error = %err, "payment processor failed");
                Err(err.into())
            }
        }
    }

    async fn abandon_initial(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        subscription: &Subscription,
        payment: &Payment,
        plan: &SubscriptionPlan,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        payments::mark_failed(&mut **tx, payment.id, reason, now).await?;
        subscriptions::cancel(&mut **tx, subscription.id, SubscriptionStatus::Pending, now, Some(now)).await?;
        NotificationService::notify(
            &mut **tx,
            subscription.user_id,
            NotificationKind::PaymentFailed,
            "Payment failed",
            &format!("We could not charge {} {} for the {} plan: {reason}", payment.amount, payment.currency, plan.name),
        )
        .await
    }

    /// Cancel the user's live subscription. Without `immediately` the user
    /// keeps access until the current period ends.
    pub async fn cancel(&self, user_id: Uuid, immediately: bool) -> Result<SubscriptionDetails, ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let subscription = subscriptions::live_for_user(&mut *tx, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("No active subscription to cancel"))?;
        ensure_transition(subscription.status, SubscriptionStatus::Cancelled)?;

        let was_pending = subscription.status == SubscriptionStatus::Pending;
        let end_date = (immediately || was_pending).then_some(now);
        let cancelled = subscriptions::cancel(&mut *tx, subscription.id, subscription.status, now, end_date)
            .await?
            .ok_or_else(|| ServiceError::conflict("Subscription changed concurrently"))?;

        if was_pending {
            payments::fail_pending_for_subscription(&mut *tx, cancelled.id, "cancelled", now).await?;
        }

        NotificationService::notify(
            &mut *tx,
            user_id,
            NotificationKind::SubscriptionCancelled,
            "Subscription cancelled",
            &if immediately || was_pending {
                "Your subscription has been cancelled.".to_string()
            } else {
                format!("Your subscription will end on {}.", cancelled.end_date.date_naive())
            },
        )
        .await?;
        tx.commit().await?;

        info!(subscription_id = %cancelled.id, %user_id, immediately, "subscription cancelled");
        with_plan(&self.pool, cancelled, now).await
    }

    /// Undo a cancellation while the paid period is still running
    pub async fn reactivate(&self, user_id: Uuid) -> Result<SubscriptionDetails, ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !users::lock(&mut *tx, user_id).await? {
            return Err(ServiceError::not_found(format!("User {user_id} not found")));
        }

        let subscription = subscriptions::current_for_user(&mut *tx, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("No subscription to reactivate"))?;
        if subscription.status != SubscriptionStatus::Cancelled {
            return Err(ServiceError::conflict(format!(
                "Only a cancelled subscription can be reactivated (current status {})",
                subscription.status
            )));
        }
        if subscription.end_date <= now {
            return Err(ServiceError::conflict("Subscription period has already ended"));
        }
        ensure_transition(subscription.status, SubscriptionStatus::Active)?;

        let reactivated = subscriptions::reactivate(&mut *tx, subscription.id, now)
            .await
            .map_err(live_conflict)?
            .ok_or_else(|| ServiceError::conflict("Subscription changed concurrently"))?;
        tx.commit().await?;

        info!(subscription_id = %reactivated.id, %user_id, "subscription reactivated");
        with_plan(&self.pool, reactivated, now).await
    }

    pub async fn set_auto_renew(&self, user_id: Uuid, enabled: bool) -> Result<SubscriptionDetails, ServiceError> {
        let subscription = subscriptions::current_for_user(&self.pool, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("No active subscription"))?;
        if subscription.status != SubscriptionStatus::Active {
            return Err(ServiceError::conflict(format!(
                "Auto-renew can only be changed on an active subscription (current status {})",
                subscription.status
            )));
        }

        let updated = subscriptions::set_auto_renew(&self.pool, subscription.id, enabled)
            .await?
            .ok_or_else(|| ServiceError::conflict("Subscription changed concurrently"))?;

        info!(subscription_id = %updated.id, %user_id, enabled, "auto-renew updated");
        with_plan(&self.pool, updated, Utc::now()).await
    }

    pub async fn preview_change(&self, user_id: Uuid, plan_id: Uuid) -> Result<ProrationQuote, ServiceError> {
        let now = Utc::now();
        let subscription = subscriptions::current_for_user(&self.pool, user_id)
            .await?
            .filter(|s| s.status == SubscriptionStatus::Active)
            .ok_or_else(|| ServiceError::not_found("No active subscription"))?;
        let current_plan = load_plan(&self.pool, subscription.plan_id).await?;
        let target = self.target_plan(plan_id, &current_plan).await?;

        Ok(billing::quote(
            current_plan.price,
            subscription.start_date,
            subscription.end_date,
            target.price,
            now,
        ))
    }

    /// Switch plans mid-period. The unused share of the current period is
    /// credited toward the new plan and the new period starts now.
    pub async fn change_plan(&self, user_id: Uuid, plan_id: Uuid) -> Result<PlanChange, ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let subscription = subscriptions::live_for_user(&mut *tx, user_id)
            .await?
            .filter(|s| s.status == SubscriptionStatus::Active)
            .ok_or_else(|| ServiceError::not_found("No active subscription"))?;
        let current_plan = load_plan(&mut *tx, subscription.plan_id).await?;
        let target = self.target_plan(plan_id, &current_plan).await?;
        let quote = billing::quote(
            current_plan.price,
            subscription.start_date,
            subscription.end_date,
            target.price,
            now,
        );

        if quote.amount_due.is_zero() {
            let changed = self.apply_plan_change(&mut tx, &subscription, &current_plan, &target, now).await?;
            tx.commit().await?;
            return Ok(PlanChange {
                subscription: details(changed, target, now),
                quote,
                payment: None,
            });
        }

        let payment = payments::insert_pending(
            &mut *tx,
            &NewPayment {
                user_id,
                subscription_id: Some(subscription.id),
                amount: quote.amount_due,
                currency: &target.currency,
                purpose: PaymentPurpose::PlanChange,
                provider: self.processor.name(),
            },
        )
        .await?;
        tx.commit().await?;

        let outcome = self.charge(&payment).await;
        let finalized_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let (reason, processor_error) = match outcome {
            Ok(ChargeOutcome::Approved { transaction_id }) => {
                let current = subscriptions::find_for_update(&mut *tx, subscription.id, false).await?;
                let unchanged = current
                    .as_ref()
                    .is_some_and(|s| s.status == SubscriptionStatus::Active && s.plan_id == current_plan.id);
                if !unchanged {
                    // Charged for a change that can no longer apply; reverse it.
                    payments::refund_approved(&mut *tx, payment.id, &transaction_id, finalized_at).await?;
                    tx.commit().await?;
                    warn!(subscription_id = %subscription.id, payment_id = %payment.id, "plan change superseded, payment refunded");
                    return Err(ServiceError::conflict("Subscription changed while the payment was being processed"));
                }

                let completed = payments::mark_completed(&mut *tx, payment.id, &transaction_id, finalized_at)
                    .await?
                    .unwrap_or(payment);
                let changed = self
                    .apply_plan_change(&mut tx, &subscription, &current_plan, &target, finalized_at)
                    .await?;
                tx.commit().await?;
                return Ok(PlanChange {
                    subscription: details(changed, target, finalized_at),
                    quote,
                    payment: Some(completed),
                });
            }
            Ok(ChargeOutcome::Declined { reason }) => (reason, None),
            Err(err) => (err.to_string(), Some(err)),
        };

        payments::mark_failed(&mut *tx, payment.id, &reason, finalized_at).await?;
        NotificationService::notify(
            &mut *tx,
            user_id,
            NotificationKind::PaymentFailed,
            "Payment failed",
            &format!("Your change to the {} plan was not applied: {reason}", target.name),
        )
        .await?;
        tx.commit().await?;

        match processor_error {
            Some(err) => {
                warn!(subscription_id = %subscription.id, %user_id, error = %err, "payment processor failed");
                Err(err.into())
            }
            None => {
                warn!(subscription_id = %subscription.id, %user_id, %reason, "plan change payment declined");
                Err(ServiceError::PaymentDeclined(reason))
            }
        }
    }

    async fn apply_plan_change(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        subscription: &Subscription,
        from: &SubscriptionPlan,
        to: &SubscriptionPlan,
        now: DateTime<Utc>,
    ) -> Result<Subscription, ServiceError> {
        let changed = subscriptions::change_plan(&mut **tx, subscription.id, to.id, now, period_end(now, to))
            .await?
            .ok_or_else(|| ServiceError::conflict("Subscription changed concurrently"))?;
        NotificationService::notify(
            &mut **tx,
            subscription.user_id,
            NotificationKind::PlanChanged,
            "Plan changed",
            &format!("You moved from {} to {}. Your new period ends on {}.", from.name, to.name, changed.end_date.date_naive()),
        )
        .await?;
        info!(subscription_id = %changed.id, from = %from.slug, to = %to.slug, "plan changed");
        Ok(changed)
    }

    async fn target_plan(&self, plan_id: Uuid, current: &SubscriptionPlan) -> Result<SubscriptionPlan, ServiceError> {
        let target = plans::find(&self.pool, plan_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Plan {plan_id} not found")))?;
        if !target.is_active {
            return Err(ServiceError::validation(format!("Plan '{}' is not available", target.slug)));
        }
        if target.id == current.id {
            return Err(ServiceError::validation("Already subscribed to this plan"));
        }
        Ok(target)
    }

    /// Renew one subscription for another period.
    ///
    /// The row stays locked for the whole attempt, including the charge, so
    /// two workers can never renew the same subscription twice. A row that is
    /// already locked is skipped rather than waited on.
    pub async fn renew(&self, subscription_id: Uuid) -> Result<RenewalOutcome, ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let Some(subscription) = subscriptions::find_for_update(&mut *tx, subscription_id, true).await? else {
            tx.rollback().await?;
            return match subscriptions::find(&self.pool, subscription_id).await? {
                Some(_) => Ok(RenewalOutcome::Skipped {
                    subscription_id,
                    reason: "locked by another worker".to_string(),
                }),
                None => Err(ServiceError::not_found(format!("Subscription {subscription_id} not found"))),
            };
        };

        if subscription.status != SubscriptionStatus::Active || !subscription.auto_renew {
            return Ok(RenewalOutcome::Skipped {
                subscription_id,
                reason: format!(
                    "status {} with auto_renew {}",
                    subscription.status, subscription.auto_renew
                ),
            });
        }

        let plan = load_plan(&mut *tx, subscription.plan_id).await?;

        if plan.is_free() {
            let new_end_date = billing::extend_period(subscription.end_date, now, plan.duration_days);
            self.record_renewal(&mut tx, &subscription, &plan, new_end_date).await?;
            tx.commit().await?;
            return Ok(RenewalOutcome::Renewed {
                subscription_id,
                new_end_date,
                payment_id: None,
            });
        }

        // Committed on its own so the attempt is on record even if this
        // transaction is lost.
        let payment = payments::insert_pending(
            &self.pool,
            &NewPayment {
                user_id: subscription.user_id,
                subscription_id: Some(subscription.id),
                amount: plan.price,
                currency: &plan.currency,
                purpose: PaymentPurpose::Renewal,
                provider: self.processor.name(),
            },
        )
        .await?;

        let reason = match self.charge(&payment).await {
            Ok(ChargeOutcome::Approved { transaction_id }) => {
                let finalized_at = Utc::now();
                payments::mark_completed(&mut *tx, payment.id, &transaction_id, finalized_at).await?;
                let new_end_date = billing::extend_period(subscription.end_date, finalized_at, plan.duration_days);
                self.record_renewal(&mut tx, &subscription, &plan, new_end_date).await?;
                tx.commit().await?;
                return Ok(RenewalOutcome::Renewed {
                    subscription_id,
                    new_end_date,
                    payment_id: Some(payment.id),
                });
            }
            Ok(ChargeOutcome::Declined { reason }) => reason,
            Err(err) => err.to_string(),
        };

        let finalized_at = Utc::now();
        payments::mark_failed(&mut *tx, payment.id, &reason, finalized_at).await?;

        let attempts = subscription.renewal_attempts + 1;
        let attempts_so_far = u32::try_from(subscription.renewal_attempts).unwrap_or(0);
        let retry_at = self.retry.next_retry_at(attempts_so_far, finalized_at);

        let outcome = match retry_at {
            Some(next_retry_at) => {
                subscriptions::record_renewal_failure(&mut *tx, subscription_id, attempts, next_retry_at).await?;
                NotificationService::notify(
                    &mut *tx,
                    subscription.user_id,
                    NotificationKind::RenewalFailed,
                    "Renewal payment failed",
                    &format!(
                        "We could not renew your {} plan ({reason}). We will try again on {}.",
                        plan.name,
                        next_retry_at.date_naive()
                    ),
                )
                .await?;
                warn!(%subscription_id, attempts, %next_retry_at, %reason, "renewal failed, retry scheduled");
                RenewalOutcome::RetryScheduled {
                    subscription_id,
                    attempts,
                    next_retry_at,
                }
            }
            None => {
                subscriptions::expire(&mut *tx, subscription_id, SubscriptionStatus::Active, finalized_at).await?;
                NotificationService::notify(
                    &mut *tx,
                    subscription.user_id,
                    NotificationKind::SubscriptionExpired,
                    "Subscription expired",
                    &format!("We could not renew your {} plan after {attempts} attempts ({reason}).", plan.name),
                )
                .await?;
                warn!(%subscription_id, attempts, %reason, "renewal retries exhausted, subscription expired");
                RenewalOutcome::Expired { subscription_id }
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn record_renewal(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        subscription: &Subscription,
        plan: &SubscriptionPlan,
        new_end_date: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        subscriptions::record_renewal(&mut **tx, subscription.id, new_end_date)
            .await?
            .ok_or_else(|| ServiceError::conflict("Subscription changed concurrently"))?;
        NotificationService::notify(
            &mut **tx,
            subscription.user_id,
            NotificationKind::SubscriptionRenewed,
            "Subscription renewed",
            &format!("Your {} plan now runs until {}.", plan.name, new_end_date.date_naive()),
        )
        .await?;
        info!(subscription_id = %subscription.id, %new_end_date, "subscription renewed");
        Ok(())
    }

    /// Listing allowance for the user's entitling plan, or the free tier
    pub async fn quota(&self, user_id: Uuid) -> Result<ListingQuota, ServiceError> {
        let now = Utc::now();
        let plan = match subscriptions::current_for_user(&self.pool, user_id).await? {
            Some(s) if is_entitled(s.status, s.end_date, now) => Some(load_plan(&self.pool, s.plan_id).await?),
            _ => None,
        };
        let used_listings = users::count_active_listings(&self.pool, user_id).await?;

        let max_listings = match &plan {
            Some(plan) => plan.max_listings.map(i64::from),
            None => Some(self.free_tier_listings),
        };

        Ok(ListingQuota {
            plan: plan.map(|p| p.slug),
            max_listings,
            used_listings,
            remaining: max_listings.map(|max| (max - used_listings).max(0)),
        })
    }

    /// Payment history, newest first
    pub async fn payments(&self, user_id: Uuid, pagination: Pagination) -> Result<Page<Payment>, ServiceError> {
        let filter = PaymentFilter {
            status: None,
            user_id: Some(user_id),
        };
        let items = payments::list(&self.pool, &filter, pagination).await?;
        let total = payments::count(&self.pool, &filter).await?;
        Ok(Page::new(items, total, pagination))
    }

    async fn charge(&self, payment: &Payment) -> Result<ChargeOutcome, ProcessorError> {
        let request = ChargeRequest {
            payment_id: payment.id,
            user_id: payment.user_id,
            amount: payment.amount,
            currency: payment.currency.clone(),
            purpose: payment.purpose,
        };
        self.processor.charge(&request).await
    }
}

fn period_end(start: DateTime<Utc>, plan: &SubscriptionPlan) -> DateTime<Utc> {
    start + Duration::days(i64::from(plan.duration_days))
}

fn details(subscription: Subscription, plan: SubscriptionPlan, now: DateTime<Utc>) -> SubscriptionDetails {
    let entitled = is_entitled(subscription.status, subscription.end_date, now);
    SubscriptionDetails {
        subscription,
        plan,
        entitled,
    }
}

pub(crate) async fn load_plan<'e, E>(executor: E, plan_id: Uuid) -> Result<SubscriptionPlan, ServiceError>
where
    E: PgExecutor<'e>,
{
    plans::find(executor, plan_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Plan {plan_id} not found")))
}

pub(crate) async fn with_plan<'e, E>(
    executor: E,
    subscription: Subscription,
    now: DateTime<Utc>,
) -> Result<SubscriptionDetails, ServiceError>
where
    E: PgExecutor<'e>,
{
    let plan = load_plan(executor, subscription.plan_id).await?;
    Ok(details(subscription, plan, now))
}

fn live_subscription_exists() -> ServiceError {
    ServiceError::conflict("User already has a pending or active subscription")
}

fn live_conflict(err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::UniqueViolation(ref constraint) if constraint == LIVE_SUBSCRIPTION_INDEX => {
            live_subscription_exists()
        }
        other => other.into(),
    }
}
