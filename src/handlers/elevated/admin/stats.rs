// handlers/elevated/admin/stats.rs - GET /api/admin/stats

use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AdminStats;
use crate::state::AppState;

pub async fn show(State(state): State<AppState>) -> ApiResult<AdminStats> {
    Ok(ApiResponse::success(state.admin().stats().await?))
}
