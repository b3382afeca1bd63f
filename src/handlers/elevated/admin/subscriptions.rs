// handlers/elevated/admin/subscriptions.rs - any user's subscriptions
//
// GET  /api/admin/subscriptions?status=&user_id=&limit=&offset=
// GET  /api/admin/subscriptions/:id
// POST /api/admin/subscriptions/:id/extend   {"days": n}
// POST /api/admin/subscriptions/:id/expire
// POST /api/admin/subscriptions/:id/cancel
// POST /api/admin/subscriptions/:id/renew

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{SubscriptionDetails, SubscriptionStatus};
use crate::database::repository::subscriptions::SubscriptionFilter;
use crate::database::repository::{Page, Pagination};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::RenewalOutcome;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<SubscriptionStatus>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendRequest {
    pub days: i32,
}

pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Page<SubscriptionDetails>> {
    let Query(query) = query?;
    let api = &state.config().api;
    let pagination = Pagination::clamped(query.limit, query.offset, api.default_page_size, api.max_page_size);
    let filter = SubscriptionFilter {
        status: query.status,
        user_id: query.user_id,
    };

    let page = state.admin().list_subscriptions(filter, pagination).await?;
    Ok(ApiResponse::success(page))
}

pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<SubscriptionDetails> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.admin().get_subscription(id).await?))
}

pub async fn extend(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ExtendRequest>, JsonRejection>,
) -> ApiResult<SubscriptionDetails> {
    let Path(id) = id?;
    let Json(body) = payload?;
    Ok(ApiResponse::success(state.admin().extend_subscription(id, body.days).await?))
}

pub async fn expire(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<SubscriptionDetails> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.admin().force_expire(id).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<SubscriptionDetails> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.admin().cancel_subscription(id).await?))
}

/// Run one renewal attempt now, whatever the due date
pub async fn renew(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<RenewalOutcome> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.subscriptions().renew(id).await?))
}
