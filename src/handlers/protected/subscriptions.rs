// handlers/protected/subscriptions.rs - the caller's subscription lifecycle
//
// GET  /api/subscriptions/me
// POST /api/subscriptions
// POST /api/subscriptions/me/cancel
// POST /api/subscriptions/me/reactivate
// PUT  /api/subscriptions/me/auto-renew
// GET  /api/subscriptions/me/change-preview?plan_id=
// POST /api/subscriptions/me/change-plan
// GET  /api/subscriptions/me/quota

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::billing::ProrationQuote;
use crate::database::models::SubscriptionDetails;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::services::{ListingQuota, PlanChange};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub plan_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub immediately: bool,
}

#[derive(Debug, Deserialize)]
pub struct AutoRenewRequest {
    pub enabled: bool,
}

/// GET /api/subscriptions/me - latest non-expired subscription, or `null`
pub async fn current(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
) -> ApiResult<Option<SubscriptionDetails>> {
    let current = state.subscriptions().current(user.id).await?;
    Ok(ApiResponse::success(current))
}

/**
 * POST /api/subscriptions - Subscribe to a plan
 *
 * Expected Input:
 * ```json
 * { "plan_id": "uuid" }
 * ```
 *
 * 201 with the ACTIVE subscription, 402 when the card is declined, 409 when
 * the caller already has a pending or active subscription.
 */
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> ApiResult<SubscriptionDetails> {
    let Json(body) = payload?;
    let subscription = state.subscriptions().subscribe(user.id, body.plan_id).await?;
    Ok(ApiResponse::created(subscription))
}

/// POST /api/subscriptions/me/cancel - `{"immediately": bool}`, body optional
///
/// An empty body cancels at period end. A body that is present must be valid.
pub async fn cancel(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
    body: Bytes,
) -> ApiResult<SubscriptionDetails> {
    let request = parse_cancel(&body)?;
    let subscription = state.subscriptions().cancel(user.id, request.immediately).await?;
    Ok(ApiResponse::success(subscription))
}

/// POST /api/subscriptions/me/reactivate
pub async fn reactivate(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
) -> ApiResult<SubscriptionDetails> {
    let subscription = state.subscriptions().reactivate(user.id).await?;
    Ok(ApiResponse::success(subscription))
}

/// PUT /api/subscriptions/me/auto-renew - `{"enabled": bool}`
pub async fn set_auto_renew(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
    payload: Result<Json<AutoRenewRequest>, JsonRejection>,
) -> ApiResult<SubscriptionDetails> {
    let Json(body) = payload?;
    let subscription = state.subscriptions().set_auto_renew(user.id, body.enabled).await?;
    Ok(ApiResponse::success(subscription))
}

/// GET /api/subscriptions/me/change-preview?plan_id= - proration quote, no side effects
pub async fn change_preview(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
    query: Result<Query<PlanRequest>, QueryRejection>,
) -> ApiResult<ProrationQuote> {
    let Query(query) = query.map_err(|_| ApiError::bad_request("plan_id query parameter must be a UUID"))?;
    let quote = state.subscriptions().preview_change(user.id, query.plan_id).await?;
    Ok(ApiResponse::success(quote))
}

/// POST /api/subscriptions/me/change-plan - `{"plan_id": "uuid"}`
pub async fn change_plan(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> ApiResult<PlanChange> {
    let Json(body) = payload?;
    let change = state.subscriptions().change_plan(user.id, body.plan_id).await?;
    Ok(ApiResponse::success(change))
}

/// GET /api/subscriptions/me/quota - listing allowance and usage
pub async fn quota(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
) -> ApiResult<ListingQuota> {
    let quota = state.subscriptions().quota(user.id).await?;
    Ok(ApiResponse::success(quota))
}

fn parse_cancel(body: &[u8]) -> Result<CancelRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CancelRequest::default());
    }
    let Json(request) = Json::<CancelRequest>::from_bytes(body)?;
    Ok(request)
}
