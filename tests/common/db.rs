//! Database-backed fixtures for the engine and job tests.
//!
//! These tests need PostgreSQL. They read `TEST_DATABASE_URL`, then
//! `DATABASE_URL`, and skip with a message when neither is set. Every test
//! works on its own users and plans, so they can share one database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marketplace_api::billing::{ChargeOutcome, ChargeRequest, PaymentProcessor, ProcessorError};
use marketplace_api::config::AppConfig;
use marketplace_api::database::models::{CreatePlanInput, Payment, Role, Subscription, SubscriptionPlan, User};
use marketplace_api::database::repository::{plans, subscriptions, users};
use marketplace_api::database::DatabaseManager;
use marketplace_api::state::AppState;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// Connect and migrate, or `None` when no database is configured
pub async fn connect() -> Result<Option<PgPool>> {
    let _ = dotenvy::dotenv();
    let url = std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL"));
    let Ok(url) = url else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL to run database tests");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&url)
        .await
        .context("failed to connect to the test database")?;
    DatabaseManager::migrate(&pool).await?;
    Ok(Some(pool))
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.billing.max_payment_retries = 3;
    config.billing.retry_backoff_days = vec![1, 3, 7];
    config.billing.free_tier_listings = 3;
    config.jobs.renewal_batch_size = 10_000;
    config
}

pub fn state_with(pool: &PgPool, processor: Arc<dyn PaymentProcessor>) -> AppState {
    AppState::new(test_config(), pool.clone(), processor)
}

pub async fn create_user(pool: &PgPool) -> Result<User> {
    let email = format!("user-{}@example.com", Uuid::new_v4().simple());
    Ok(users::insert(pool, &email, "Test User", "not-a-real-hash", Role::User).await?)
}

/// A plan with a unique slug; `price` in cents
pub async fn create_plan(pool: &PgPool, price_cents: i64, duration_days: i32, max_listings: Option<i32>) -> Result<SubscriptionPlan> {
    let input = CreatePlanInput {
        slug: format!("t-{}", Uuid::new_v4().simple()),
        name: format!("Plan {price_cents}"),
        description: None,
        price: Decimal::new(price_cents, 2),
        currency: None,
        duration_days,
        max_listings,
        featured_listings: 0,
    };
    Ok(plans::insert(pool, &input, "USD").await?)
}

pub async fn reload(pool: &PgPool, id: Uuid) -> Result<Subscription> {
    subscriptions::find(pool, id).await?.context("subscription vanished")
}

pub async fn payments_for(pool: &PgPool, subscription_id: Uuid) -> Result<Vec<Payment>> {
    let rows = sqlx::query_as::<_, Payment>(
        "SELECT id, user_id, subscription_id, amount, currency, status, purpose, provider,
                transaction_id, failure_reason, created_at, processed_at, refunded_at
         FROM payments WHERE subscription_id = $1 ORDER BY created_at ASC",
    )
    .bind(subscription_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn notification_kinds(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT kind FROM notifications WHERE user_id = $1 ORDER BY created_at ASC")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(kind,)| kind).collect())
}

/// Move a subscription's period so that it ends at `end_date`
pub async fn set_period_end(pool: &PgPool, id: Uuid, end_date: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE subscriptions SET start_date = $2 - INTERVAL '30 days', end_date = $2 WHERE id = $1")
        .bind(id)
        .bind(end_date)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn backdate_created(pool: &PgPool, table: &str, id: Uuid, age: Duration) -> Result<()> {
    let sql = format!("UPDATE {table} SET created_at = NOW() - make_interval(secs => $2) WHERE id = $1");
    sqlx::query(&sql)
        .bind(id)
        .bind(age.num_seconds() as f64)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Decline,
    Unavailable,
}

/// Processor whose answer the test sets, counting every charge it sees
pub struct ScriptedProcessor {
    verdict: Mutex<Verdict>,
    calls: AtomicUsize,
}

impl ScriptedProcessor {
    pub fn new(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            verdict: Mutex::new(verdict),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, verdict: Verdict) {
        *self.verdict.lock().expect("verdict lock") = verdict;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let verdict = *self.verdict.lock().expect("verdict lock");
        match verdict {
            Verdict::Approve => Ok(ChargeOutcome::Approved {
                transaction_id: format!("txn_{}", request.payment_id.simple()),
            }),
            Verdict::Decline => Ok(ChargeOutcome::Declined {
                reason: "card declined".to_string(),
            }),
            Verdict::Unavailable => Err(ProcessorError::Unavailable("gateway timeout".to_string())),
        }
    }
}
