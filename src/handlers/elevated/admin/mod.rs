// handlers/elevated/admin/mod.rs - back-office endpoints
pub mod jobs;
pub mod payments;
pub mod plans;
pub mod stats;
pub mod subscriptions;
