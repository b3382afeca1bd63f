// handlers/elevated/admin/payments.rs - payment ledger and refunds

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{Payment, PaymentStatus};
use crate::database::repository::payments::PaymentFilter;
use crate::database::repository::{Page, Pagination};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<PaymentStatus>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/admin/payments?status=&user_id=&limit=&offset=
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Page<Payment>> {
    let Query(query) = query?;
    let api = &state.config().api;
    let pagination = Pagination::clamped(query.limit, query.offset, api.default_page_size, api.max_page_size);
    let filter = PaymentFilter {
        status: query.status,
        user_id: query.user_id,
    };

    Ok(ApiResponse::success(state.admin().list_payments(filter, pagination).await?))
}

/// POST /api/admin/payments/:id/refund - COMPLETED only, 409 otherwise
pub async fn refund(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Payment> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.admin().refund_payment(id).await?))
}
