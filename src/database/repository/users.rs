use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Role, User};

const USER_COLUMNS: &str = "id, email, name, password_hash, role, is_active, created_at, updated_at";

pub async fn find<'e, E>(executor: E, id: Uuid) -> Result<Option<User>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let user = sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(executor).await?;
    Ok(user)
}

pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
    let user = sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(executor).await?;
    Ok(user)
}

pub async fn insert<'e, E>(
    executor: E,
    email: &str,
    name: &str,
    password_hash: &str,
    role: Role,
) -> Result<User, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO users (email, name, password_hash, role)
         VALUES (LOWER($1), $2, $3, $4)
         RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(role)
        .fetch_one(executor)
        .await?;
    Ok(user)
}

/// Take a row lock on the user; serializes subscription changes per user.
/// Returns false when the user does not exist.
pub async fn lock<'e, E>(executor: E, id: Uuid) -> Result<bool, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.is_some())
}

/// Listings that count against a plan's allowance
pub async fn count_active_listings<'e, E>(executor: E, user_id: Uuid) -> Result<i64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM listings WHERE user_id = $1 AND status <> 'ARCHIVED'")
        .bind(user_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}
