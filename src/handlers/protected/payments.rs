// handlers/protected/payments.rs - GET /api/payments handler

use axum::extract::{rejection::QueryRejection, Query, State};
use axum::Extension;
use serde::Deserialize;

use crate::database::models::Payment;
use crate::database::repository::{Page, Pagination};
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn pagination(&self, state: &AppState) -> Pagination {
        let api = &state.config().api;
        Pagination::clamped(self.limit, self.offset, api.default_page_size, api.max_page_size)
    }
}

/// GET /api/payments?limit=&offset= - the caller's payment history, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(ValidatedUser(user)): Extension<ValidatedUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<Payment>> {
    let Query(query) = query?;
    let page = state.subscriptions().payments(user.id, query.pagination(&state)).await?;
    Ok(ApiResponse::success(page))
}
