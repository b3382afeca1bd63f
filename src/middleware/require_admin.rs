use axum::{extract::Request, middleware::Next, response::Response};

use super::auth::AuthUser;
use crate::error::ApiError;

/// Gate for the elevated tier. Runs after JWT auth and before any database
/// lookup, so a USER token is turned away without touching the pool.
pub async fn require_admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before role check"))?;

    if !auth_user.is_admin() {
        tracing::warn!(user_id = %auth_user.user_id, role = %auth_user.role, "admin route refused");
        return Err(ApiError::forbidden("Administrator role required"));
    }

    Ok(next.run(request).await)
}
