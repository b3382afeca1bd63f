//! Query functions per table.
//!
//! Every function takes any `PgExecutor`, so the same query runs against the
//! pool or inside a service's transaction (`&mut *tx`).

pub mod notifications;
pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod users;

use serde::{Deserialize, Serialize};

/// Limit/offset window, clamped to the configured page sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let api = &crate::config::config().api;
        Self::clamped(limit, offset, api.default_page_size, api.max_page_size)
    }

    pub fn clamped(limit: Option<i64>, offset: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        Self {
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit.max(1)),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

/// One page of rows plus the unpaged total
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        }
    }
}
