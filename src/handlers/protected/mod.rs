// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware → validate_user_middleware
//
// Handlers read the caller from the `ValidatedUser` extension and only ever
// act on the caller's own subscription and payments.
pub mod auth;
pub mod payments;
pub mod subscriptions;
