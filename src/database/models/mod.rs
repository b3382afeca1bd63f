pub mod notification;
pub mod payment;
pub mod plan;
pub mod subscription;
pub mod user;

pub use notification::{Notification, NotificationKind};
pub use payment::{Payment, PaymentPurpose, PaymentStatus};
pub use plan::{CreatePlanInput, SubscriptionPlan, UpdatePlanInput};
pub use subscription::{Subscription, SubscriptionDetails, SubscriptionStatus};
pub use user::{Role, User};
