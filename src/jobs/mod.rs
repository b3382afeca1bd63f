//! Scheduled maintenance jobs.
//!
//! Every row transition a job makes is conditional on the row's current
//! status, so running a job twice is harmless. Overlapping runs are still
//! refused: once per process by [`JobGuards`], and across processes by a
//! PostgreSQL advisory lock held on a dedicated connection.

mod cleanup;
mod expire;
mod purge;
mod renew;
pub mod scheduler;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::config::JobsConfig;
use crate::services::ServiceError;
use crate::state::AppState;

pub use scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    ExpireSubscriptions,
    RenewSubscriptions,
    CleanupPending,
    PurgeNotifications,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::ExpireSubscriptions,
        JobKind::RenewSubscriptions,
        JobKind::CleanupPending,
        JobKind::PurgeNotifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ExpireSubscriptions => "expire-subscriptions",
            JobKind::RenewSubscriptions => "renew-subscriptions",
            JobKind::CleanupPending => "cleanup-pending",
            JobKind::PurgeNotifications => "purge-notifications",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            JobKind::ExpireSubscriptions => "Expire subscriptions whose period ended and that will not renew",
            JobKind::RenewSubscriptions => "Charge and extend auto-renewing subscriptions that are due",
            JobKind::CleanupPending => "Cancel subscriptions stuck in PENDING and fail their payments",
            JobKind::PurgeNotifications => "Delete read notifications past the retention period",
        }
    }

    pub fn interval(&self, jobs: &JobsConfig) -> Duration {
        let secs = match self {
            JobKind::ExpireSubscriptions => jobs.expire_interval_secs,
            JobKind::RenewSubscriptions => jobs.renew_interval_secs,
            JobKind::CleanupPending => jobs.cleanup_interval_secs,
            JobKind::PurgeNotifications => jobs.purge_interval_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    /// Advisory lock key: the first 8 bytes of SHA-256 over the job name
    pub fn lock_key(&self) -> i64 {
        let digest = Sha256::digest(format!("marketplace-api:job:{}", self.as_str()).as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        i64::from_be_bytes(bytes)
    }

    fn index(&self) -> usize {
        match self {
            JobKind::ExpireSubscriptions => 0,
            JobKind::RenewSubscriptions => 1,
            JobKind::CleanupPending => 2,
            JobKind::PurgeNotifications => 3,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = JobKind::ALL.iter().map(JobKind::as_str).collect();
                format!("unknown job '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

impl Serialize for JobKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: JobKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// The run did not happen because another run held the job's lock
    pub skipped: bool,
}

/// Per-row counters a job fills in while it runs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JobTally {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl JobTally {
    fn success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    fn failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    /// Looked at but left alone, e.g. a row another worker already changed
    fn untouched(&mut self) {
        self.processed += 1;
    }
}

/// In-process "already running" flags, one per job
#[derive(Debug, Default)]
pub struct JobGuards {
    running: [AtomicBool; 4],
}

impl JobGuards {
    pub fn try_acquire(&self, kind: JobKind) -> Option<JobGuard<'_>> {
        let flag = &self.running[kind.index()];
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobGuard { flag })
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.running[kind.index()].load(Ordering::Acquire)
    }
}

/// Clears its job's running flag when dropped
#[derive(Debug)]
pub struct JobGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Run one job to completion, unless another run holds its lock
pub async fn run_job(state: &AppState, kind: JobKind) -> Result<JobReport, ServiceError> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let Some(_guard) = state.job_guards().try_acquire(kind) else {
        info!(job = %kind, "job already running in this process, skipping");
        return Ok(skipped_report(kind, started_at));
    };

    let key = kind.lock_key();
    let mut lock_conn = state.pool().acquire().await?;
    let (locked,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .bind(key)
        .fetch_one(&mut *lock_conn)
        .await?;
    if !locked {
        info!(job = %kind, "job locked by another process, skipping");
        return Ok(skipped_report(kind, started_at));
    }

    info!(job = %kind, "job started");
    let mut tally = JobTally::default();
    let outcome = match kind {
        JobKind::ExpireSubscriptions => expire::run(state, &mut tally).await,
        JobKind::RenewSubscriptions => renew::run(state, &mut tally).await,
        JobKind::CleanupPending => cleanup::run(state, &mut tally).await,
        JobKind::PurgeNotifications => purge::run(state, &mut tally).await,
    };

    // Session-level lock: must be released on the connection that took it.
    let unlocked = sqlx::query_as::<_, (bool,)>("SELECT pg_advisory_unlock($1)")
        .bind(key)
        .fetch_one(&mut *lock_conn)
        .await;
    if let Err(e) = unlocked {
        warn!(job = %kind, error = %e, "failed to release advisory lock, dropping connection");
        let _ = lock_conn.detach();
    }

    let duration_ms = clock.elapsed().as_millis() as u64;
    match outcome {
        Ok(()) => {
            info!(
                job = %kind,
                processed = tally.processed,
                succeeded = tally.succeeded,
                failed = tally.failed,
                duration_ms,
                "job finished"
            );
            Ok(JobReport {
                job: kind,
                started_at,
                finished_at: Utc::now(),
                processed: tally.processed,
                succeeded: tally.succeeded,
                failed: tally.failed,
                skipped: false,
            })
        }
        Err(e) => {
            error!(job = %kind, error = %e, processed = tally.processed, duration_ms, "job aborted");
            Err(e)
        }
    }
}

/// Run every job once, in declaration order
pub async fn run_all(state: &AppState) -> Result<Vec<JobReport>, ServiceError> {
    let mut reports = Vec::with_capacity(JobKind::ALL.len());
    for kind in JobKind::ALL {
        reports.push(run_job(state, kind).await?);
    }
    Ok(reports)
}

fn skipped_report(kind: JobKind, started_at: DateTime<Utc>) -> JobReport {
    JobReport {
        job: kind,
        started_at,
        finished_at: Utc::now(),
        processed: 0,
        succeeded: 0,
        failed: 0,
        skipped: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_names_parse_back() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>(), Ok(kind));
        }
        let err = "vacuum".parse::<JobKind>().unwrap_err();
        assert!(err.contains("renew-subscriptions"));
    }

    #[test]
    fn lock_keys_are_stable_and_distinct() {
        let keys: Vec<i64> = JobKind::ALL.iter().map(JobKind::lock_key).collect();
        assert_eq!(keys, JobKind::ALL.iter().map(JobKind::lock_key).collect::<Vec<_>>());
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn guard_refuses_overlap_until_dropped() {
        let guards = JobGuards::default();
        let first = guards.try_acquire(JobKind::RenewSubscriptions);
        assert!(first.is_some());
        assert!(guards.is_running(JobKind::RenewSubscriptions));
        assert!(guards.try_acquire(JobKind::RenewSubscriptions).is_none());

        // Other jobs are independent.
        assert!(guards.try_acquire(JobKind::ExpireSubscriptions).is_some());

        drop(first);
        assert!(!guards.is_running(JobKind::RenewSubscriptions));
        assert!(guards.try_acquire(JobKind::RenewSubscriptions).is_some());
    }

    #[test]
    fn tally_counts() {
        let mut tally = JobTally::default();
        tally.success();
        tally.failure();
        tally.untouched();
        assert_eq!(
            tally,
            JobTally {
                processed: 3,
                succeeded: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn report_serializes_job_name() {
        let report = skipped_report(JobKind::CleanupPending, Utc::now());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["job"], "cleanup-pending");
        assert_eq!(value["skipped"], true);
    }
}
