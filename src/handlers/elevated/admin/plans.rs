// handlers/elevated/admin/plans.rs - plan catalog management
//
// GET    /api/admin/plans?include_inactive=
// POST   /api/admin/plans
// GET    /api/admin/plans/:id
// PATCH  /api/admin/plans/:id
// DELETE /api/admin/plans/:id   (deactivates; subscriptions keep the plan)

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{CreatePlanInput, SubscriptionPlan, UpdatePlanInput};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_include_inactive")]
    pub include_inactive: bool,
}

fn default_include_inactive() -> bool {
    true
}

pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<SubscriptionPlan>> {
    let Query(query) = query?;
    let plans = state.plans().list(query.include_inactive).await?;
    Ok(ApiResponse::success(plans))
}

/**
 * POST /api/admin/plans - Create a plan
 *
 * Expected Input:
 * ```json
 * {
 *   "slug": "pro-monthly",
 *   "name": "Pro",
 *   "price": "19.99",
 *   "duration_days": 30,
 *   "max_listings": 50,        // optional, null = unlimited
 *   "featured_listings": 5,    // optional
 *   "currency": "USD"          // optional, defaults to the billing currency
 * }
 * ```
 *
 * 400 with `field_errors` on invalid input, 409 on a duplicate slug.
 */
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreatePlanInput>, JsonRejection>,
) -> ApiResult<SubscriptionPlan> {
    let Json(input) = payload?;
    let plan = state.plans().create(input).await?;
    Ok(ApiResponse::created(plan))
}

pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<SubscriptionPlan> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.plans().get(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdatePlanInput>, JsonRejection>,
) -> ApiResult<SubscriptionPlan> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    Ok(ApiResponse::success(state.plans().update(id, patch).await?))
}

pub async fn deactivate(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<SubscriptionPlan> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.plans().deactivate(id).await?))
}
