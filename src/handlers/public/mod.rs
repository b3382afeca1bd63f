// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Routes: /, /health, /auth/login, /plans
pub mod auth;
pub mod plans;
pub mod system;
