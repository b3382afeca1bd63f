pub mod auth;
pub mod billing;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod server;
pub mod services;
pub mod state;

#[cfg(test)]
pub mod testing;
