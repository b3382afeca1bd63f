//! Fixtures for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::billing::{ChargeOutcome, ChargeRequest, PaymentProcessor, ProcessorError};
use crate::database::models::{Subscription, SubscriptionPlan, SubscriptionStatus};

pub fn plan_fixture(slug: &str, price: Decimal, duration_days: i32) -> SubscriptionPlan {
    let now = Utc::now();
    SubscriptionPlan {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: slug.to_uppercase(),
        description: None,
        price,
        currency: "USD".to_string(),
        duration_days,
        max_listings: Some(10),
        featured_listings: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn subscription_fixture(
    plan: &SubscriptionPlan,
    status: SubscriptionStatus,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        plan_id: plan.id,
        status,
        auto_renew: true,
        start_date,
        end_date,
        cancelled_at: None,
        renewal_attempts: 0,
        next_retry_at: None,
        created_at: start_date,
        updated_at: start_date,
    }
}

/// Processor that approves every charge without touching the network
pub struct FixedProcessor;

impl FixedProcessor {
    pub fn approving() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentProcessor for FixedProcessor {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ProcessorError> {
        Ok(ChargeOutcome::Approved {
            transaction_id: format!("fixed_{}", request.payment_id.simple()),
        })
    }
}
