use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use serde::Deserialize;
use serde_json::json;

use crate::cli::utils::{output_collection, output_success};
use crate::cli::{app_state, OutputFormat};
use crate::database::models::{CreatePlanInput, SubscriptionPlan};

#[derive(Subcommand)]
pub enum PlanCommands {
    #[command(about = "List subscription plans")]
    List {
        #[arg(long, help = "Include deactivated plans")]
        all: bool,
    },

    #[command(about = "Create or update plans from a YAML file, keyed by slug")]
    Seed {
        #[arg(help = "Path to a YAML file with a top-level 'plans' list")]
        file: PathBuf,
    },
}

/// Seed file layout
#[derive(Debug, Deserialize)]
struct PlanSeed {
    plans: Vec<CreatePlanInput>,
}

pub async fn handle(cmd: PlanCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = app_state()?;
    let plans = state.plans();

    match cmd {
        PlanCommands::List { all } => {
            let rows = plans.list(all).await?;
            output_collection(output_format, "plans", &rows, "No plans configured", print_plans)
        }
        PlanCommands::Seed { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let seed = parse_seed(&raw).with_context(|| format!("invalid plan file {}", file.display()))?;

            let mut slugs = Vec::with_capacity(seed.plans.len());
            for input in seed.plans {
                let slug = input.slug.clone();
                plans
                    .upsert(input)
                    .await
                    .with_context(|| format!("failed to seed plan '{}'", slug))?;
                slugs.push(slug);
            }

            output_success(
                output_format,
                &format!("Seeded {} plan(s)", slugs.len()),
                Some(json!({ "plans": slugs })),
            )
        }
    }
}

fn parse_seed(raw: &str) -> anyhow::Result<PlanSeed> {
    Ok(serde_yaml::from_str(raw)?)
}

fn print_plans(rows: &[SubscriptionPlan]) {
    println!(
        "{:<12} {:<20} {:>10} {:<4} {:>6} {:>9}  {}",
        "SLUG", "NAME", "PRICE", "CUR", "DAYS", "LISTINGS", "ACTIVE"
    );
    println!("{}", "-".repeat(78));
    for plan in rows {
        let listings = plan
            .max_listings
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unlimited".to_string());
        println!(
            "{:<12} {:<20} {:>10} {:<4} {:>6} {:>9}  {}",
            plan.slug,
            plan.name,
            plan.price,
            plan.currency,
            plan.duration_days,
            listings,
            if plan.is_active { "yes" } else { "no" }
        );
    }
}
