use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_collection, output_success};
use crate::cli::{app_state, OutputFormat};
use crate::jobs::{self, JobKind, JobReport};

#[derive(Subcommand)]
pub enum JobCommands {
    #[command(about = "List maintenance jobs and their intervals")]
    List,

    #[command(about = "Run a job once, or every job with 'all'")]
    Run {
        #[arg(help = "Job name (expire-subscriptions, renew-subscriptions, cleanup-pending, purge-notifications) or 'all'")]
        job: String,
    },
}

pub async fn handle(cmd: JobCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        JobCommands::List => {
            let jobs_config = &crate::config::config().jobs;
            let rows: Vec<_> = JobKind::ALL
                .iter()
                .map(|kind| {
                    json!({
                        "name": kind.as_str(),
                        "description": kind.description(),
                        "interval_secs": kind.interval(jobs_config).as_secs(),
                    })
                })
                .collect();

            output_collection(output_format, "jobs", &rows, "No jobs", |_| {
                println!("{:<22} {:>10}  {}", "NAME", "INTERVAL", "DESCRIPTION");
                println!("{}", "-".repeat(80));
                for kind in JobKind::ALL {
                    println!(
                        "{:<22} {:>9}s  {}",
                        kind.as_str(),
                        kind.interval(jobs_config).as_secs(),
                        kind.description()
                    );
                }
            })
        }
        JobCommands::Run { job } => {
            let state = app_state()?;

            let reports = if job == "all" {
                jobs::run_all(&state).await?
            } else {
                let kind: JobKind = job.parse().map_err(anyhow::Error::msg)?;
                vec![jobs::run_job(&state, kind).await?]
            };

            match output_format {
                OutputFormat::Json => {
                    output_success(output_format, "Jobs finished", Some(json!({ "reports": reports })))
                }
                OutputFormat::Text => {
                    reports.iter().for_each(print_report);
                    Ok(())
                }
            }
        }
    }
}

fn print_report(report: &JobReport) {
    if report.skipped {
        println!("- {} skipped (already running)", report.job);
        return;
    }

    let elapsed = report.finished_at - report.started_at;
    println!(
        "✓ {} processed={} succeeded={} failed={} ({} ms)",
        report.job,
        report.processed,
        report.succeeded,
        report.failed,
        elapsed.num_milliseconds()
    );
}
