//! `market` operator CLI: migrations, plan seeding, user bootstrap and
//! one-shot job runs against the configured database.

pub mod commands;
pub mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::database::DatabaseManager;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "market")]
#[command(about = "Marketplace CLI - operator tasks for the subscription API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply database migrations")]
    Migrate,

    #[command(about = "Run the HTTP server")]
    Serve,

    #[command(about = "Subscription plan catalog")]
    Plans {
        #[command(subcommand)]
        cmd: commands::plans::PlanCommands,
    },

    #[command(about = "User accounts")]
    Users {
        #[command(subcommand)]
        cmd: commands::users::UserCommands,
    },

    #[command(about = "Maintenance jobs")]
    Jobs {
        #[command(subcommand)]
        cmd: commands::jobs::JobCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let result = match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Serve => crate::server::serve().await,
        Commands::Plans { cmd } => commands::plans::handle(cmd, output_format).await,
        Commands::Users { cmd } => commands::users::handle(cmd, output_format).await,
        Commands::Jobs { cmd } => commands::jobs::handle(cmd, output_format).await,
    };

    DatabaseManager::close().await;
    result
}

/// Application state over the shared pool, as the server would build it
pub(crate) fn app_state() -> anyhow::Result<AppState> {
    let pool = DatabaseManager::main_pool().context("failed to configure the database pool")?;
    Ok(AppState::with_simulator(config::config().clone(), pool))
}
