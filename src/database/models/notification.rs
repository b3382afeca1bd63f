use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle events the subscription engine reports to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    SubscriptionActivated,
    SubscriptionRenewed,
    SubscriptionCancelled,
    SubscriptionExpired,
    PaymentFailed,
    RenewalFailed,
    PlanChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SubscriptionActivated => "SUBSCRIPTION_ACTIVATED",
            NotificationKind::SubscriptionRenewed => "SUBSCRIPTION_RENEWED",
            NotificationKind::SubscriptionCancelled => "SUBSCRIPTION_CANCELLED",
            NotificationKind::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
            NotificationKind::PaymentFailed => "PAYMENT_FAILED",
            NotificationKind::RenewalFailed => "RENEWAL_FAILED",
            NotificationKind::PlanChanged => "PLAN_CHANGED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
