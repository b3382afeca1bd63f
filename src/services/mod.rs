pub mod admin_service;
pub mod auth_service;
pub mod error;
pub mod notification_service;
pub mod plan_service;
pub mod subscription_service;

pub use admin_service::{AdminService, AdminStats};
pub use auth_service::{AuthService, LoginResponse};
pub use error::ServiceError;
pub use notification_service::NotificationService;
pub use plan_service::PlanService;
pub use subscription_service::{ListingQuota, PlanChange, RenewalOutcome, SubscriptionService};
