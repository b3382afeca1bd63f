// handlers/protected/auth.rs - GET /api/auth/whoami handler

use axum::Extension;

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};

/// GET /api/auth/whoami - the authenticated user's profile
pub async fn whoami(Extension(ValidatedUser(user)): Extension<ValidatedUser>) -> ApiResult<User> {
    Ok(ApiResponse::success(user))
}
