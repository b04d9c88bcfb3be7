//! Recurring per-location alert checks.
//!
//! Each job is a tokio task driven by `tokio::time::interval` and a
//! `CancellationToken`. The first tick fires immediately. Ticks for one job
//! never overlap; a slow tick makes the next one fire right after it instead
//! of waiting a full period. Errors are recorded on the job and the schedule
//! carries on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agrialert_weather::Coordinates;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::error::AlertError;
use crate::pipeline::{CheckOutcome, LocationCheck};

pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;

/// Snapshot of a scheduled job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: String,
    pub location: Coordinates,
    pub interval_minutes: u32,
    pub created: DateTime<Utc>,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_result: Option<CheckOutcome>,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    info: JobInfo,
    cancel: CancellationToken,
    /// Distinguishes a replaced job's late results from the current one's
    generation: u64,
}

type JobTable = Arc<RwLock<HashMap<String, JobEntry>>>;

pub struct AlertScheduler {
    checker: Arc<dyn LocationCheck>,
    clock: Arc<dyn Clock>,
    jobs: JobTable,
    next_generation: AtomicU64,
    shutdown: CancellationToken,
}

impl AlertScheduler {
    pub fn new(checker: Arc<dyn LocationCheck>) -> Self {
        Self::with_clock(checker, Arc::new(SystemClock))
    }

    pub fn with_clock(checker: Arc<dyn LocationCheck>, clock: Arc<dyn Clock>) -> Self {
        Self {
            checker,
            clock,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start (or restart) the recurring check `id` for `location`.
    ///
    /// An existing job with the same id is cancelled and replaced. Must be
    /// called from within a tokio runtime.
    pub fn schedule_alert_check(
        &self,
        id: &str,
        location: Coordinates,
        interval_minutes: u32,
    ) -> Result<JobInfo, AlertError> {
        if id.trim().is_empty() {
            return Err(AlertError::invalid_input("Job ID is required"));
        }
        if !location.is_valid() {
            return Err(AlertError::invalid_input("Location (lat/lng) is invalid"));
        }
        if interval_minutes == 0 {
            return Err(AlertError::invalid_input(
                "Interval must be a positive number of minutes",
            ));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();
        let info = JobInfo {
            id: id.to_string(),
            location,
            interval_minutes,
            created: self.clock.now(),
            active: true,
            last_run: None,
            last_result: None,
            last_error: None,
            last_error_time: None,
            stopped_at: None,
        };

        let replaced = self.jobs.write().insert(
            id.to_string(),
            JobEntry {
                info: info.clone(),
                cancel: cancel.clone(),
                generation,
            },
        );
        if let Some(old) = replaced {
            old.cancel.cancel();
            tracing::info!("Replaced existing alert check job {}", id);
        }

        let period = Duration::from_secs(u64::from(interval_minutes) * 60);
        tokio::spawn(run_job(
            JobContext {
                id: id.to_string(),
                location,
                generation,
                checker: Arc::clone(&self.checker),
                clock: Arc::clone(&self.clock),
                jobs: Arc::clone(&self.jobs),
            },
            period,
            cancel,
        ));

        tracing::info!(
            "Scheduled alert check {} for {} every {} minutes",
            id,
            location,
            interval_minutes
        );
        Ok(info)
    }

    /// Cancel job `id`. Returns false if it is unknown or already stopped.
    pub fn stop_alert_check(&self, id: &str) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(id) {
            Some(entry) if entry.info.active => {
                entry.cancel.cancel();
                entry.info.active = false;
                entry.info.stopped_at = Some(self.clock.now());
                tracing::info!("Stopped alert check job {}", id);
                true
            }
            _ => false,
        }
    }

    pub fn get_job(&self, id: &str) -> Option<JobInfo> {
        self.jobs.read().get(id).map(|entry| entry.info.clone())
    }

    /// All jobs, stopped ones included, oldest first
    pub fn get_scheduled_jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .jobs
            .read()
            .values()
            .map(|entry| entry.info.clone())
            .collect();
        jobs.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn active_count(&self) -> usize {
        self.jobs.read().values().filter(|e| e.info.active).count()
    }

    /// Cancel every job
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let now = self.clock.now();
        let mut jobs = self.jobs.write();
        for entry in jobs.values_mut().filter(|e| e.info.active) {
            entry.info.active = false;
            entry.info.stopped_at = Some(now);
        }
        tracing::info!("Alert scheduler shut down ({} jobs)", jobs.len());
    }
}

impl Drop for AlertScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct JobContext {
    id: String,
    location: Coordinates,
    generation: u64,
    checker: Arc<dyn LocationCheck>,
    clock: Arc<dyn Clock>,
    jobs: JobTable,
}

impl JobContext {
    fn record(&self, result: Result<CheckOutcome, AlertError>) {
        let now = self.clock.now();
        let mut jobs = self.jobs.write();
        let Some(entry) = jobs.get_mut(&self.id) else {
            return;
        };
        if entry.generation != self.generation {
            return;
        }

        entry.info.last_run = Some(now);
        match result {
            Ok(outcome) => entry.info.last_result = Some(outcome),
            Err(e) => {
                entry.info.last_error = Some(e.to_string());
                entry.info.last_error_time = Some(now);
            }
        }
    }
}

async fn run_job(ctx: JobContext, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tracing::debug!("Running scheduled alert check {} for {}", ctx.id, ctx.location);
        let result = ctx.checker.check_location(ctx.location).await;
        if let Err(e) = &result {
            tracing::error!("Scheduled alert check {} failed: {}", ctx.id, e);
        }
        ctx.record(result);
    }

    tracing::debug!("Alert check task {} exited", ctx.id);
}
