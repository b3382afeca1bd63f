use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use super::{run_job, JobKind};
use crate::state::AppState;

/// One background task per job, each on its own interval
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(state: AppState) -> Self {
        let (shutdown, receiver) = watch::channel(false);
        let handles = JobKind::ALL
            .into_iter()
            .map(|kind| tokio::spawn(job_loop(state.clone(), kind, receiver.clone())))
            .collect();

        info!("Job scheduler started");
        Self { shutdown, handles }
    }

    /// Signal every task and wait for in-flight runs to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("job task panicked: {}", e);
            }
        }
        info!("Job scheduler stopped");
    }
}

async fn job_loop(state: AppState, kind: JobKind, mut shutdown: watch::Receiver<bool>) {
    let period = kind.interval(&state.config().jobs);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(job = %kind, interval_secs = period.as_secs(), "job scheduled");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_job(&state, kind).await {
                    error!(job = %kind, error = %e, "scheduled job run failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
