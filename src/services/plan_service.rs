use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{CreatePlanInput, SubscriptionPlan, UpdatePlanInput};
use crate::database::repository::plans;
use crate::database::DatabaseError;
use crate::services::ServiceError;

const MAX_DURATION_DAYS: i32 = 3650;

/// Plan catalog management for the back-office and seeding
pub struct PlanService {
    pool: PgPool,
    default_currency: String,
}

impl PlanService {
    pub fn new(pool: PgPool, default_currency: impl Into<String>) -> Self {
        Self {
            pool,
            default_currency: default_currency.into(),
        }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, ServiceError> {
        Ok(plans::list(&self.pool, include_inactive).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<SubscriptionPlan, ServiceError> {
        plans::find(&self.pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Plan {id} not found")))
    }

    pub async fn create(&self, input: CreatePlanInput) -> Result<SubscriptionPlan, ServiceError> {
        let currency = self.currency_for(&input);
        validate_create(&input, &currency)?;

        let plan = plans::insert(&self.pool, &input, &currency)
            .await
            .map_err(|err| duplicate_slug(err, &input.slug))?;
        info!(plan_id = %plan.id, slug = %plan.slug, "plan created");
        Ok(plan)
    }

    /// Create the plan, or overwrite the one with the same slug
    pub async fn upsert(&self, input: CreatePlanInput) -> Result<SubscriptionPlan, ServiceError> {
        let currency = self.currency_for(&input);
        validate_create(&input, &currency)?;

        let plan = plans::upsert_by_slug(&self.pool, &input, &currency).await?;
        info!(plan_id = %plan.id, slug = %plan.slug, "plan upserted");
        Ok(plan)
    }

    pub async fn update(&self, id: Uuid, patch: UpdatePlanInput) -> Result<SubscriptionPlan, ServiceError> {
        validate_update(&patch)?;

        let plan = plans::update(&self.pool, id, &patch)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Plan {id} not found")))?;
        info!(plan_id = %plan.id, slug = %plan.slug, "plan updated");
        Ok(plan)
    }

    /// Hide the plan from new subscribers. Existing subscriptions keep it.
    pub async fn deactivate(&self, id: Uuid) -> Result<SubscriptionPlan, ServiceError> {
        let plan = plans::deactivate(&self.pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Plan {id} not found")))?;
        info!(plan_id = %plan.id, slug = %plan.slug, "plan deactivated");
        Ok(plan)
    }

    fn currency_for(&self, input: &CreatePlanInput) -> String {
        input
            .currency
            .as_deref()
            .unwrap_or(&self.default_currency)
            .trim()
            .to_uppercase()
    }
}

fn duplicate_slug(err: DatabaseError, slug: &str) -> ServiceError {
    match err {
        DatabaseError::UniqueViolation(_) => ServiceError::conflict(format!("A plan with slug '{slug}' already exists")),
        other => other.into(),
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    (2..=64).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn validate_create(input: &CreatePlanInput, currency: &str) -> Result<(), ServiceError> {
    let mut errors = HashMap::new();

    if !is_valid_slug(&input.slug) {
        errors.insert(
            "slug".to_string(),
            "must be 2-64 characters of lowercase letters, digits or '-'".to_string(),
        );
    }
    if input.name.trim().is_empty() {
        errors.insert("name".to_string(), "must not be empty".to_string());
    }
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        errors.insert("currency".to_string(), "must be a 3-letter ISO 4217 code".to_string());
    }
    check_price(input.price, &mut errors);
    check_duration(input.duration_days, &mut errors);
    check_limits(input.max_listings, Some(input.featured_listings), &mut errors);

    finish(errors)
}

fn validate_update(patch: &UpdatePlanInput) -> Result<(), ServiceError> {
    let mut errors = HashMap::new();

    if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        errors.insert("name".to_string(), "must not be empty".to_string());
    }
    if let Some(price) = patch.price {
        check_price(price, &mut errors);
    }
    if let Some(days) = patch.duration_days {
        check_duration(days, &mut errors);
    }
    check_limits(patch.max_listings.flatten(), patch.featured_listings, &mut errors);

    finish(errors)
}

fn check_price(price: Decimal, errors: &mut HashMap<String, String>) {
    if price < Decimal::ZERO {
        errors.insert("price".to_string(), "must not be negative".to_string());
    } else if price.scale() > 2 {
        errors.insert("price".to_string(), "must have at most 2 decimal places".to_string());
    }
}

fn check_duration(days: i32, errors: &mut HashMap<String, String>) {
    if !(1..=MAX_DURATION_DAYS).contains(&days) {
        errors.insert(
            "duration_days".to_string(),
            format!("must be between 1 and {MAX_DURATION_DAYS}"),
        );
    }
}

fn check_limits(max_listings: Option<i32>, featured: Option<i32>, errors: &mut HashMap<String, String>) {
    if max_listings.is_some_and(|n| n < 0) {
        errors.insert("max_listings".to_string(), "must not be negative".to_string());
    }
    if featured.is_some_and(|n| n < 0) {
        errors.insert("featured_listings".to_string(), "must not be negative".to_string());
    }
}

fn finish(errors: HashMap<String, String>) -> Result<(), ServiceError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::invalid_fields(errors))
    }
}
