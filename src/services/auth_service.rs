use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::auth::{self, Claims, PasswordError};
use crate::database::models::{Role, User};
use crate::database::repository::users;
use crate::database::DatabaseError;
use crate::services::ServiceError;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

pub struct AuthService {
    pool: PgPool,
}

impl AuthService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Exchange email and password for a bearer token. Unknown emails and
    /// wrong passwords produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ServiceError> {
        let user = users::find_by_email(&self.pool, email.trim())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !auth::verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "login rejected: bad password");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        if !user.is_active {
            return Err(ServiceError::Forbidden("Account is disabled".to_string()));
        }

        let claims = Claims::for_user(&user);
        let token = auth::generate_jwt(&claims).map_err(|e| {
            tracing::error!("token generation failed: {}", e);
            ServiceError::internal("Could not issue a token")
        })?;

        info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(LoginResponse {
            token,
            expires_at: claims.exp,
            user,
        })
    }

    pub async fn create_user(&self, email: &str, name: &str, password: &str, role: Role) -> Result<User, ServiceError> {
        let email = email.trim();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(ServiceError::validation(format!("'{email}' is not a valid email address")));
        }
        if name.trim().is_empty() {
            return Err(ServiceError::validation("name must not be empty"));
        }

        let password_hash = auth::hash_password(password).map_err(|e| match e {
            PasswordError::TooShort => ServiceError::validation(e.to_string()),
            PasswordError::Hash => ServiceError::internal("password could not be hashed"),
        })?;

        let user = users::insert(&self.pool, email, name.trim(), &password_hash, role)
            .await
            .map_err(|e| match e {
                DatabaseError::UniqueViolation(_) => ServiceError::conflict(format!("User {email} already exists")),
                other => other.into(),
            })?;

        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }
}
