// handlers/public/plans.rs - public plan catalog

use axum::extract::{rejection::PathRejection, Path, State};
use uuid::Uuid;

use crate::database::models::SubscriptionPlan;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /plans - active plans, cheapest first
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<SubscriptionPlan>> {
    let plans = state.subscriptions().list_plans().await?;
    Ok(ApiResponse::success(plans))
}

/// GET /plans/:id - a single active plan
pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<SubscriptionPlan> {
    let Path(id) = id?;
    let plan = state.plans().get(id).await?;
    if !plan.is_active {
        return Err(ApiError::not_found(format!("Plan {} not found", id)));
    }
    Ok(ApiResponse::success(plan))
}
