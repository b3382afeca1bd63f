use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::database::models::User;
use crate::database::repository::users;
use crate::error::ApiError;
use crate::state::AppState;

/// The database row behind the bearer token, injected for handlers
#[derive(Clone, Debug)]
pub struct ValidatedUser(pub User);

/// Middleware that checks the token's user still exists, is active and
/// still holds the role the token was issued with
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?
        .clone();

    let user = users::find(state.pool(), auth_user.user_id).await?.ok_or_else(|| {
        tracing::warn!("User validation failed: user {} no longer exists", auth_user.user_id);
        ApiError::unauthorized("User no longer exists")
    })?;

    if !user.is_active {
        tracing::warn!("User validation failed: user {} is disabled", user.id);
        return Err(ApiError::forbidden("Account is disabled"));
    }

    if user.role != auth_user.role {
        tracing::warn!(
            "User validation failed: JWT role '{}' doesn't match database role '{}'",
            auth_user.role,
            user.role
        );
        return Err(ApiError::forbidden("User role changed, please log in again"));
    }

    tracing::debug!("User validation successful: {} ({})", user.email, user.role);
    request.extensions_mut().insert(ValidatedUser(user));

    Ok(next.run(request).await)
}
