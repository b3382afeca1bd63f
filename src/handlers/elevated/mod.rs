// handlers/elevated/mod.rs - Elevated handlers (ADMIN role required)
//
// Security Level: JWT + ADMIN role
// Route Prefix: /api/admin/*
// Middleware: jwt_auth_middleware → require_admin_middleware → validate_user_middleware
//
// The role check runs on the token claims before any database access, so a
// USER token is refused even when the database is down.
pub mod admin;
