use std::collections::HashMap;
use thiserror::Error;

use crate::billing::{LifecycleError, ProcessorError};
use crate::database::DatabaseError;

/// Domain failures shared by all services. The HTTP layer maps each variant
/// to a status code; the CLI prints them as-is.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Database(DatabaseError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// Server-side failure outside the database, such as token signing
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn invalid_fields(field_errors: HashMap<String, String>) -> Self {
        ServiceError::Validation {
            message: "Validation failed".to_string(),
            field_errors: Some(field_errors),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(what) => ServiceError::NotFound(what),
            DatabaseError::UniqueViolation(constraint) => {
                ServiceError::Conflict(format!("Duplicate value violates {constraint}"))
            }
            other => ServiceError::Database(other),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

impl From<LifecycleError> for ServiceError {
    fn from(err: LifecycleError) -> Self {
        ServiceError::Conflict(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::SubscriptionStatus;

    #[test]
    fn unique_violation_becomes_conflict() {
        let err: ServiceError = DatabaseError::UniqueViolation("subscription_plans_slug_key".into()).into();
        assert!(matches!(err, ServiceError::Conflict(ref m) if m.contains("subscription_plans_slug_key")));
    }

    #[test]
    fn lifecycle_error_becomes_conflict() {
        let err: ServiceError = LifecycleError {
            from: SubscriptionStatus::Expired,
            to: SubscriptionStatus::Active,
        }
        .into();
        assert_eq!(err.to_string(), "subscription cannot move from EXPIRED to ACTIVE");
    }

    #[test]
    fn pool_timeout_stays_a_database_error() {
        let err: ServiceError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ServiceError::Database(ref db) if db.is_unavailable()));
    }
}
