mod common;

use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::db::{self, ScriptedProcessor, Verdict};
use marketplace_api::billing::{ChargeOutcome, ChargeRequest, PaymentProcessor, ProcessorError};
use marketplace_api::database::models::{PaymentPurpose, PaymentStatus, SubscriptionStatus};
use marketplace_api::database::repository::payments::{self, NewPayment};
use marketplace_api::database::repository::{subscriptions, Pagination};
use marketplace_api::services::{RenewalOutcome, ServiceError};
use sqlx::PgPool;

macro_rules! database_or_skip {
    () => {
        match db::connect().await? {
            Some(pool) => pool,
            None => return Ok(()),
        }
    };
}

/// Approves the charge, but only after the payer has cancelled
struct CancelsBeforeApproving {
    pool: PgPool,
}

#[async_trait]
impl PaymentProcessor for CancelsBeforeApproving {
    fn name(&self) -> &str {
        "cancels-first"
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ProcessorError> {
        db::state_with(&self.pool, ScriptedProcessor::new(Verdict::Approve))
            .subscriptions()
            .cancel(request.user_id, false)
            .await
            .map_err(|e| ProcessorError::Unavailable(e.to_string()))?;
        Ok(ChargeOutcome::Approved {
            transaction_id: format!("txn_{}", request.payment_id.simple()),
        })
    }
}

#[tokio::test]
async fn paid_subscribe_activates_after_approval() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Approve);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;

    let details = state.subscriptions().subscribe(user.id, plan.id).await?;
    let subscription = &details.subscription;
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert!(subscription.auto_renew);
    assert!(details.entitled);
    assert_eq!(subscription.end_date - subscription.start_date, Duration::days(30));
    assert_eq!(processor.calls(), 1);

    let payments = db::payments_for(&pool, subscription.id).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Completed);
    assert_eq!(payments[0].purpose, PaymentPurpose::Initial);
    assert_eq!(payments[0].amount, plan.price);
    assert_eq!(payments[0].transaction_id.as_deref(), Some(format!("txn_{}", payments[0].id.simple()).as_str()));

    let kinds = db::notification_kinds(&pool, user.id).await?;
    assert_eq!(kinds, vec!["SUBSCRIPTION_ACTIVATED".to_string()]);
    Ok(())
}

#[tokio::test]
async fn free_plan_activates_without_a_charge() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Decline);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 0, 30, Some(5)).await?;

    let details = state.subscriptions().subscribe(user.id, plan.id).await?;
    assert_eq!(details.subscription.status, SubscriptionStatus::Active);
    assert_eq!(processor.calls(), 0);
    assert!(db::payments_for(&pool, details.subscription.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn one_live_subscription_per_user() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve));
    let user = db::create_user(&pool).await?;
    let basic = db::create_plan(&pool, 999, 30, Some(10)).await?;
    let pro = db::create_plan(&pool, 2999, 30, None).await?;

    state.subscriptions().subscribe(user.id, basic.id).await?;
    let err = state.subscriptions().subscribe(user.id, pro.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");

    let (live,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1 AND status IN ('PENDING', 'ACTIVE')")
            .bind(user.id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(live, 1);
    Ok(())
}

#[tokio::test]
async fn declined_initial_payment_cancels_the_subscription() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Decline);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;

    let err = state.subscriptions().subscribe(user.id, plan.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::PaymentDeclined(ref reason) if reason == "card declined"), "{err:?}");

    let details = state.subscriptions().current(user.id).await?.context("cancelled subscription")?;
    let subscription = details.subscription;
    assert_eq!(subscription.status, SubscriptionStatus::Cancelled);
    assert!(!subscription.auto_renew);
    assert!(!details.entitled);
    // Closed the moment it started: the period collapses but never inverts.
    assert!(subscription.end_date >= subscription.start_date);
    assert!(subscription.end_date - subscription.start_date < Duration::minutes(1));

    let payments = db::payments_for(&pool, subscription.id).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    assert_eq!(payments[0].failure_reason.as_deref(), Some("card declined"));
    assert!(db::notification_kinds(&pool, user.id).await?.contains(&"PAYMENT_FAILED".to_string()));

    // The failed attempt does not block a new one.
    processor.set(Verdict::Approve);
    let retried = state.subscriptions().subscribe(user.id, plan.id).await?;
    assert_eq!(retried.subscription.status, SubscriptionStatus::Active);
    Ok(())
}

#[tokio::test]
async fn processor_outage_on_subscribe_is_not_a_decline() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Unavailable));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;

    let err = state.subscriptions().subscribe(user.id, plan.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Processor(_)), "{err:?}");

    let current = state.subscriptions().current(user.id).await?.context("subscription row")?;
    assert_eq!(current.subscription.status, SubscriptionStatus::Cancelled);
    let payments = db::payments_for(&pool, current.subscription.id).await?;
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn cancelled_mid_charge_keeps_the_approved_transaction() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, std::sync::Arc::new(CancelsBeforeApproving { pool: pool.clone() }));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;

    let err = state.subscriptions().subscribe(user.id, plan.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");

    let current = state.subscriptions().current(user.id).await?.context("subscription row")?;
    assert_eq!(current.subscription.status, SubscriptionStatus::Cancelled);

    let payments = db::payments_for(&pool, current.subscription.id).await?;
    assert_eq!(payments.len(), 1);
    let payment = &payments[0];
    assert_eq!(payment.status, PaymentStatus::Refunded);
    assert_eq!(payment.transaction_id.as_deref(), Some(format!("txn_{}", payment.id.simple()).as_str()));
    assert!(payment.refunded_at.is_some());
    Ok(())
}

#[tokio::test]
async fn cancel_at_period_end_then_reactivate() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 999, 30, Some(10)).await?;
    let service = state.subscriptions();

    let active = service.subscribe(user.id, plan.id).await?.subscription;
    let cancelled = service.cancel(user.id, false).await?;
    assert_eq!(cancelled.subscription.status, SubscriptionStatus::Cancelled);
    assert_eq!(cancelled.subscription.end_date, active.end_date);
    assert!(!cancelled.subscription.auto_renew);
    assert!(cancelled.subscription.cancelled_at.is_some());
    assert!(cancelled.entitled);

    let reactivated = service.reactivate(user.id).await?;
    assert_eq!(reactivated.subscription.status, SubscriptionStatus::Active);
    assert!(reactivated.subscription.auto_renew);
    assert!(reactivated.subscription.cancelled_at.is_none());
    assert_eq!(reactivated.subscription.end_date, active.end_date);
    Ok(())
}

#[tokio::test]
async fn immediate_cancel_ends_access_and_blocks_reactivation() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 999, 30, Some(10)).await?;
    let service = state.subscriptions();

    service.subscribe(user.id, plan.id).await?;
    let cancelled = service.cancel(user.id, true).await?;
    let subscription = &cancelled.subscription;
    assert_eq!(subscription.status, SubscriptionStatus::Cancelled);
    assert!(subscription.end_date >= subscription.start_date);
    assert!(subscription.end_date <= Utc::now());
    assert!(!cancelled.entitled);

    let err = service.reactivate(user.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");

    let err = service.cancel(user.id, true).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");

    let resubscribed = service.subscribe(user.id, plan.id).await?;
    assert_eq!(resubscribed.subscription.status, SubscriptionStatus::Active);
    Ok(())
}

#[tokio::test]
async fn auto_renew_toggles_only_on_active_subscriptions() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 999, 30, Some(10)).await?;
    let service = state.subscriptions();

    let err = service.set_auto_renew(user.id, false).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");

    service.subscribe(user.id, plan.id).await?;
    assert!(!service.set_auto_renew(user.id, false).await?.subscription.auto_renew);
    assert!(service.set_auto_renew(user.id, true).await?.subscription.auto_renew);

    service.cancel(user.id, false).await?;
    let err = service.set_auto_renew(user.id, true).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn upgrade_charges_the_prorated_difference() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Approve);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let basic = db::create_plan(&pool, 1000, 30, Some(10)).await?;
    let pro = db::create_plan(&pool, 3000, 30, None).await?;
    let service = state.subscriptions();

    let subscription = service.subscribe(user.id, basic.id).await?.subscription;
    let preview = service.preview_change(user.id, pro.id).await?;
    assert!(preview.amount_due > rust_decimal::Decimal::ZERO);

    let change = service.change_plan(user.id, pro.id).await?;
    assert_eq!(change.subscription.subscription.plan_id, pro.id);
    assert_eq!(change.subscription.subscription.id, subscription.id);
    let payment = change.payment.context("upgrade payment")?;
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.purpose, PaymentPurpose::PlanChange);
    assert_eq!(payment.amount, change.quote.amount_due);
    assert!(db::notification_kinds(&pool, user.id).await?.contains(&"PLAN_CHANGED".to_string()));
    Ok(())
}

#[tokio::test]
async fn downgrade_within_credit_charges_nothing() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Approve);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let pro = db::create_plan(&pool, 3000, 30, None).await?;
    let basic = db::create_plan(&pool, 1000, 30, Some(10)).await?;
    let service = state.subscriptions();

    service.subscribe(user.id, pro.id).await?;
    let change = service.change_plan(user.id, basic.id).await?;
    assert!(change.payment.is_none());
    assert!(change.quote.amount_due.is_zero());
    assert!(change.quote.unused_credit > rust_decimal::Decimal::ZERO);
    assert_eq!(change.subscription.subscription.plan_id, basic.id);
    assert_eq!(processor.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn declined_plan_change_leaves_subscription_untouched() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Approve);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let basic = db::create_plan(&pool, 1000, 30, Some(10)).await?;
    let pro = db::create_plan(&pool, 3000, 30, None).await?;
    let service = state.subscriptions();

    let before = service.subscribe(user.id, basic.id).await?.subscription;
    processor.set(Verdict::Decline);
    let err = service.change_plan(user.id, pro.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::PaymentDeclined(_)), "{err:?}");

    let after = db::reload(&pool, before.id).await?;
    assert_eq!(after.plan_id, basic.id);
    assert_eq!(after.status, SubscriptionStatus::Active);
    assert_eq!(after.end_date, before.end_date);

    let payments = db::payments_for(&pool, before.id).await?;
    let change = payments.iter().find(|p| p.purpose == PaymentPurpose::PlanChange).context("plan change payment")?;
    assert_eq!(change.status, PaymentStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn plan_change_outage_reports_the_processor() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Approve);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let basic = db::create_plan(&pool, 1000, 30, Some(10)).await?;
    let pro = db::create_plan(&pool, 3000, 30, None).await?;
    let service = state.subscriptions();

    let before = service.subscribe(user.id, basic.id).await?.subscription;
    processor.set(Verdict::Unavailable);
    let err = service.change_plan(user.id, pro.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Processor(_)), "{err:?}");
    assert_eq!(marketplace_api::error::ApiError::from(err).status_code(), 502);

    let after = db::reload(&pool, before.id).await?;
    assert_eq!(after.plan_id, basic.id);
    let payments = db::payments_for(&pool, before.id).await?;
    let change = payments.iter().find(|p| p.purpose == PaymentPurpose::PlanChange).context("plan change payment")?;
    assert_eq!(change.status, PaymentStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn superseded_plan_change_refunds_the_charge() -> Result<()> {
    let pool = database_or_skip!();
    let user = db::create_user(&pool).await?;
    let basic = db::create_plan(&pool, 1000, 30, Some(10)).await?;
    let pro = db::create_plan(&pool, 3000, 30, None).await?;

    let subscription = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve))
        .subscriptions()
        .subscribe(user.id, basic.id)
        .await?
        .subscription;

    let racing = db::state_with(&pool, std::sync::Arc::new(CancelsBeforeApproving { pool: pool.clone() }));
    let err = racing.subscriptions().change_plan(user.id, pro.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");

    let after = db::reload(&pool, subscription.id).await?;
    assert_eq!(after.plan_id, basic.id);
    assert_eq!(after.status, SubscriptionStatus::Cancelled);

    let payments = db::payments_for(&pool, subscription.id).await?;
    let change = payments.iter().find(|p| p.purpose == PaymentPurpose::PlanChange).context("plan change payment")?;
    assert_eq!(change.status, PaymentStatus::Refunded);
    assert!(change.transaction_id.is_some());
    Ok(())
}

#[tokio::test]
async fn renewal_charges_and_extends_the_period() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Approve);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;
    let service = state.subscriptions();

    let subscription = service.subscribe(user.id, plan.id).await?.subscription;
    db::set_period_end(&pool, subscription.id, Utc::now() + Duration::hours(1)).await?;
    let before = db::reload(&pool, subscription.id).await?;

    // Renewal inserts its payment on a second connection while holding the
    // subscription row; a lock that blocks the foreign key check hangs here.
    let outcome = tokio::time::timeout(StdDuration::from_secs(15), service.renew(subscription.id))
        .await
        .context("renewal did not finish")??;
    let (new_end_date, payment_id) = match outcome {
        RenewalOutcome::Renewed { new_end_date, payment_id, .. } => (new_end_date, payment_id),
        other => anyhow::bail!("expected a renewal, got {other:?}"),
    };
    assert_eq!(new_end_date, before.end_date + Duration::days(30));

    let after = db::reload(&pool, subscription.id).await?;
    assert_eq!(after.end_date, new_end_date);
    assert_eq!(after.renewal_attempts, 0);
    assert!(after.next_retry_at.is_none());

    let payment_id = payment_id.context("renewal payment")?;
    let payment = payments::find(&pool, payment_id).await?.context("payment row")?;
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.purpose, PaymentPurpose::Renewal);
    assert!(db::notification_kinds(&pool, user.id).await?.contains(&"SUBSCRIPTION_RENEWED".to_string()));
    Ok(())
}

#[tokio::test]
async fn payment_rows_can_be_written_while_a_subscription_is_locked() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;
    let subscription = state.subscriptions().subscribe(user.id, plan.id).await?.subscription;

    let mut tx = pool.begin().await?;
    subscriptions::find_for_update(&mut *tx, subscription.id, false)
        .await?
        .context("locked row")?;

    let new_payment = NewPayment {
        user_id: user.id,
        subscription_id: Some(subscription.id),
        amount: plan.price,
        currency: &plan.currency,
        purpose: PaymentPurpose::Renewal,
        provider: "scripted",
    };
    let insert = payments::insert_pending(&pool, &new_payment);
    let payment = tokio::time::timeout(StdDuration::from_secs(5), insert)
        .await
        .context("payment insert blocked on the subscription lock")??;
    assert_eq!(payment.status, PaymentStatus::Pending);

    // A second renewer skips the held row instead of waiting.
    let outcome = state.subscriptions().renew(subscription.id).await?;
    assert!(outcome.is_skipped(), "{outcome:?}");
    tx.rollback().await?;
    Ok(())
}

#[tokio::test]
async fn failed_renewals_retry_on_schedule_then_expire() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Approve);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;
    let service = state.subscriptions();

    let subscription = service.subscribe(user.id, plan.id).await?.subscription;
    db::set_period_end(&pool, subscription.id, Utc::now() - Duration::hours(1)).await?;
    processor.set(Verdict::Decline);

    for (attempt, backoff_days) in [(1, 1), (2, 3), (3, 7)] {
        let started = Utc::now();
        let outcome = service.renew(subscription.id).await?;
        let (attempts, next_retry_at) = match outcome {
            RenewalOutcome::RetryScheduled { attempts, next_retry_at, .. } => (attempts, next_retry_at),
            other => anyhow::bail!("attempt {attempt}: expected a retry, got {other:?}"),
        };
        assert_eq!(attempts, attempt);
        assert!(next_retry_at >= started + Duration::days(backoff_days));
        assert!(next_retry_at <= Utc::now() + Duration::days(backoff_days));

        let row = db::reload(&pool, subscription.id).await?;
        assert_eq!(row.status, SubscriptionStatus::Active);
        assert_eq!(row.renewal_attempts, attempt);
    }

    let outcome = service.renew(subscription.id).await?;
    assert!(matches!(outcome, RenewalOutcome::Expired { .. }), "{outcome:?}");

    let row = db::reload(&pool, subscription.id).await?;
    assert_eq!(row.status, SubscriptionStatus::Expired);
    assert!(!row.auto_renew);
    assert!(row.next_retry_at.is_none());

    let renewals: Vec<_> = db::payments_for(&pool, subscription.id)
        .await?
        .into_iter()
        .filter(|p| p.purpose == PaymentPurpose::Renewal)
        .collect();
    assert_eq!(renewals.len(), 4);
    assert!(renewals.iter().all(|p| p.status == PaymentStatus::Failed));

    // Nothing left to renew.
    let outcome = service.renew(subscription.id).await?;
    assert!(outcome.is_skipped(), "{outcome:?}");
    Ok(())
}

#[tokio::test]
async fn renewal_skips_subscriptions_that_will_not_renew() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Approve);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;
    let service = state.subscriptions();

    let subscription = service.subscribe(user.id, plan.id).await?.subscription;
    service.set_auto_renew(user.id, false).await?;

    let outcome = service.renew(subscription.id).await?;
    assert!(outcome.is_skipped(), "{outcome:?}");
    assert_eq!(processor.calls(), 1);

    let err = service.renew(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn quota_follows_the_entitling_plan() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 999, 30, Some(10)).await?;
    let unlimited = db::create_plan(&pool, 4999, 30, None).await?;
    let service = state.subscriptions();

    sqlx::query(
        "INSERT INTO listings (user_id, title, status)
         VALUES ($1, 'bike', 'PUBLISHED'), ($1, 'lamp', 'DRAFT'), ($1, 'sofa', 'ARCHIVED')",
    )
    .bind(user.id)
    .execute(&pool)
    .await?;

    let free = service.quota(user.id).await?;
    assert_eq!(free.plan, None);
    assert_eq!(free.max_listings, Some(3));
    assert_eq!(free.used_listings, 2);
    assert_eq!(free.remaining, Some(1));

    service.subscribe(user.id, plan.id).await?;
    let paid = service.quota(user.id).await?;
    assert_eq!(paid.plan.as_deref(), Some(plan.slug.as_str()));
    assert_eq!(paid.max_listings, Some(10));
    assert_eq!(paid.remaining, Some(8));

    service.change_plan(user.id, unlimited.id).await?;
    let quota = service.quota(user.id).await?;
    assert_eq!(quota.max_listings, None);
    assert_eq!(quota.remaining, None);
    Ok(())
}

#[tokio::test]
async fn payment_history_is_newest_first() -> Result<()> {
    let pool = database_or_skip!();
    let processor = ScriptedProcessor::new(Verdict::Decline);
    let state = db::state_with(&pool, processor.clone());
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 999, 30, Some(10)).await?;
    let service = state.subscriptions();

    service.subscribe(user.id, plan.id).await.unwrap_err();
    processor.set(Verdict::Approve);
    service.subscribe(user.id, plan.id).await?;

    let page = service.payments(user.id, Pagination::clamped(None, None, 20, 100)).await?;
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].status, PaymentStatus::Completed);
    assert_eq!(page.items[1].status, PaymentStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn admin_refunds_only_completed_payments() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;

    let subscription = state.subscriptions().subscribe(user.id, plan.id).await?.subscription;
    let payment = db::payments_for(&pool, subscription.id).await?.remove(0);

    let refunded = state.admin().refund_payment(payment.id).await?;
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert!(refunded.refunded_at.is_some());

    let err = state.admin().refund_payment(payment.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");
    let err = state.admin().refund_payment(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn admin_extend_and_force_expire() -> Result<()> {
    let pool = database_or_skip!();
    let state = db::state_with(&pool, ScriptedProcessor::new(Verdict::Approve));
    let user = db::create_user(&pool).await?;
    let plan = db::create_plan(&pool, 1999, 30, Some(10)).await?;
    let admin = state.admin();

    let subscription = state.subscriptions().subscribe(user.id, plan.id).await?.subscription;
    let extended = admin.extend_subscription(subscription.id, 5).await?;
    assert_eq!(extended.subscription.end_date, subscription.end_date + Duration::days(5));

    let err = admin.extend_subscription(subscription.id, 0).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation { .. }), "{err:?}");

    let expired = admin.force_expire(subscription.id).await?;
    assert_eq!(expired.subscription.status, SubscriptionStatus::Expired);
    assert!(expired.subscription.end_date <= Utc::now());
    assert!(expired.subscription.end_date >= expired.subscription.start_date);

    let err = admin.force_expire(subscription.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");
    let err = admin.extend_subscription(subscription.id, 5).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");
    Ok(())
}
