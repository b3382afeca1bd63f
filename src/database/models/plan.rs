use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A purchasable plan in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub duration_days: i32,
    /// `None` means unlimited listings
    pub max_listings: Option<i32>,
    pub featured_listings: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    pub fn is_free(&self) -> bool {
        self.price <= Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanInput {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: Option<String>,
    pub duration_days: i32,
    pub max_listings: Option<i32>,
    #[serde(default)]
    pub featured_listings: i32,
}

/// Partial update; absent fields keep their stored value.
///
/// `max_listings` is double-wrapped so a patch can set it back to unlimited
/// with an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub duration_days: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_patch")]
    pub max_listings: Option<Option<i32>>,
    pub featured_listings: Option<i32>,
    pub is_active: Option<bool>,
}

fn deserialize_patch<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_input_distinguishes_null_from_missing() {
        let missing: UpdatePlanInput = serde_json::from_str(r#"{"name": "Pro"}"#).unwrap();
        assert_eq!(missing.max_listings, None);

        let cleared: UpdatePlanInput = serde_json::from_str(r#"{"max_listings": null}"#).unwrap();
        assert_eq!(cleared.max_listings, Some(None));

        let set: UpdatePlanInput = serde_json::from_str(r#"{"max_listings": 25}"#).unwrap();
        assert_eq!(set.max_listings, Some(Some(25)));
    }
}
