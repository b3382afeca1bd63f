use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{CreatePlanInput, SubscriptionPlan, UpdatePlanInput};

const PLAN_COLUMNS: &str = "id, slug, name, description, price, currency, duration_days, max_listings, \
                            featured_listings, is_active, created_at, updated_at";

pub async fn list<'e, E>(executor: E, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {PLAN_COLUMNS} FROM subscription_plans
         WHERE is_active OR $1
         ORDER BY price ASC, name ASC"
    );
    let plans = sqlx::query_as::<_, SubscriptionPlan>(&sql)
        .bind(include_inactive)
        .fetch_all(executor)
        .await?;
    Ok(plans)
}

pub async fn find<'e, E>(executor: E, id: Uuid) -> Result<Option<SubscriptionPlan>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1");
    let plan = sqlx::query_as::<_, SubscriptionPlan>(&sql).bind(id).fetch_optional(executor).await?;
    Ok(plan)
}

pub async fn insert<'e, E>(executor: E, input: &CreatePlanInput, currency: &str) -> Result<SubscriptionPlan, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO subscription_plans
            (slug, name, description, price, currency, duration_days, max_listings, featured_listings)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {PLAN_COLUMNS}"
    );
    let plan = sqlx::query_as::<_, SubscriptionPlan>(&sql)
        .bind(&input.slug)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(currency)
        .bind(input.duration_days)
        .bind(input.max_listings)
        .bind(input.featured_listings)
        .fetch_one(executor)
        .await?;
    Ok(plan)
}

/// Insert or refresh a plan keyed by slug (catalog seeding)
pub async fn upsert_by_slug<'e, E>(executor: E, input: &CreatePlanInput, currency: &str) -> Result<SubscriptionPlan, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO subscription_plans
            (slug, name, description, price, currency, duration_days, max_listings, featured_listings)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (slug) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            price = EXCLUDED.price,
            currency = EXCLUDED.currency,
            duration_days = EXCLUDED.duration_days,
            max_listings = EXCLUDED.max_listings,
            featured_listings = EXCLUDED.featured_listings,
            is_active = TRUE,
            updated_at = NOW()
         RETURNING {PLAN_COLUMNS}"
    );
    let plan = sqlx::query_as::<_, SubscriptionPlan>(&sql)
        .bind(&input.slug)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(currency)
        .bind(input.duration_days)
        .bind(input.max_listings)
        .bind(input.featured_listings)
        .fetch_one(executor)
        .await?;
    Ok(plan)
}

pub async fn update<'e, E>(executor: E, id: Uuid, patch: &UpdatePlanInput) -> Result<Option<SubscriptionPlan>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscription_plans SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            price = COALESCE($4, price),
            duration_days = COALESCE($5, duration_days),
            max_listings = CASE WHEN $6 THEN $7 ELSE max_listings END,
            featured_listings = COALESCE($8, featured_listings),
            is_active = COALESCE($9, is_active),
            updated_at = NOW()
         WHERE id = $1
         RETURNING {PLAN_COLUMNS}"
    );
    let plan = sqlx::query_as::<_, SubscriptionPlan>(&sql)
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.price)
        .bind(patch.duration_days)
        .bind(patch.max_listings.is_some())
        .bind(patch.max_listings.flatten())
        .bind(patch.featured_listings)
        .bind(patch.is_active)
        .fetch_optional(executor)
        .await?;
    Ok(plan)
}

pub async fn deactivate<'e, E>(executor: E, id: Uuid) -> Result<Option<SubscriptionPlan>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscription_plans SET is_active = FALSE, updated_at = NOW()
         WHERE id = $1
         RETURNING {PLAN_COLUMNS}"
    );
    let plan = sqlx::query_as::<_, SubscriptionPlan>(&sql).bind(id).fetch_optional(executor).await?;
    Ok(plan)
}
