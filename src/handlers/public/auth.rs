// handlers/public/auth.rs - POST /auth/login handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::LoginResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/**
 * POST /auth/login - Exchange credentials for a bearer token
 *
 * Expected Input:
 * ```json
 * { "email": "ada@example.com", "password": "correct horse" }
 * ```
 *
 * Expected Output (Success):
 * ```json
 * {
 *   "success": true,
 *   "data": {
 *     "token": "eyJhbGciOiJIUzI1NiI...",
 *     "expires_at": 1767225600,
 *     "user": { "id": "...", "email": "ada@example.com", "role": "USER", ... }
 *   }
 * }
 * ```
 */
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(body) = payload?;
    let response = state.auth().login(&body.email, &body.password).await?;
    Ok(ApiResponse::success(response))
}
