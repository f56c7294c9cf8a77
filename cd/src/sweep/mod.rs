//! The scheduler loop - daily and frequent sweeps
//!
//! One driver loop ticks at the frequent interval. The first tick of a new
//! local day runs the daily sweep; failed daily runs are retried on later
//! ticks up to a cap, which is the midnight watchdog. Each sweep kind is
//! serialized against itself, and the single driver keeps the two kinds
//! from overlapping each other.

use std::sync::Arc;

use chrono::NaiveDate;
use chorestore::Filter;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::SweepSettings;
use crate::domain::{Occurrence, SweepKind, SweepReport};
use crate::error::CoreResult;
use crate::service::ChoreService;

/// Drives the two periodic sweeps
pub struct Sweeper {
    service: Arc<ChoreService>,
    config: SweepSettings,
    daily_gate: Mutex<()>,
    frequent_gate: Mutex<()>,
}

impl Sweeper {
    pub fn new(service: Arc<ChoreService>, config: SweepSettings) -> Self {
        Self {
            service,
            config,
            daily_gate: Mutex::new(()),
            frequent_gate: Mutex::new(()),
        }
    }

    /// Run the driver loop until the process stops
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.config.frequent_interval_secs,
            "Sweeper started"
        );
        loop {
            self.tick().await;
            tokio::time::sleep(std::time::Duration::from_secs(self.config.frequent_interval_secs)).await;
        }
    }

    /// One driver iteration: watchdog the daily sweep, then run the
    /// frequent sweep. Errors are logged, never fatal to the loop.
    pub async fn tick(&self) {
        if let Err(e) = self.ensure_daily().await {
            error!(error = %e, "Daily sweep watchdog failed");
        }
        match self.run_frequent().await {
            Ok(report) => {
                debug!(assigned = report.assigned, overdue = report.overdue_marked, "Frequent sweep done");
            }
            Err(e) => {
                error!(error = %e, "Frequent sweep failed");
            }
        }
    }

    /// Run the daily sweep for today unless one already succeeded
    ///
    /// Capped at `daily_retry_max` attempts per local date so a
    /// persistently failing sweep cannot self-trigger forever.
    pub async fn ensure_daily(&self) -> CoreResult<()> {
        let today = self.service.clock().local_date();
        if self.service.daily_sweep_succeeded(today).await? {
            return Ok(());
        }
        let attempts = self.service.daily_sweep_attempts(today).await?;
        if attempts >= self.config.daily_retry_max {
            warn!(%today, attempts, "Daily sweep retry cap reached, giving up for today");
            return Ok(());
        }
        if attempts > 0 {
            warn!(%today, attempts, "No successful daily sweep recorded, watchdog re-running it");
        }
        self.run_daily(today).await?;
        Ok(())
    }

    /// The once-per-day sweep
    pub async fn run_daily(&self, date: NaiveDate) -> CoreResult<SweepReport> {
        let _gate = self.daily_gate.lock().await;
        let started = self.service.clock().now_ms();
        info!(%date, "Daily sweep starting");

        let result = self.daily_inner(date).await;
        let finished = self.service.clock().now_ms();

        match result {
            Ok(report) => {
                self.service
                    .record_sweep_log(SweepKind::Daily, date, started, finished, true, report.clone())
                    .await?;
                info!(
                    %date,
                    created = report.created,
                    overdue = report.overdue_marked,
                    archived = report.archived,
                    failures = report.failures,
                    "Daily sweep finished"
                );
                Ok(report)
            }
            Err(e) => {
                // Best-effort failure record so the watchdog cap holds
                let _ = self
                    .service
                    .record_sweep_log(SweepKind::Daily, date, started, finished, false, SweepReport::default())
                    .await;
                Err(e)
            }
        }
    }

    async fn daily_inner(&self, date: NaiveDate) -> CoreResult<SweepReport> {
        let mut report = SweepReport::default();
        let now = self.service.clock().now_ms();

        self.service.reset_claim_counters(date).await?;
        report.overdue_marked = self.service.mark_overdue(now).await?;
        report.archived = self.service.archive_stale_one_offs(now, self.config.one_off_grace_days).await?;

        let creation = self.service.create_due_occurrences(date).await?;
        report.merge(&creation);
        Ok(report)
    }

    /// The every-few-minutes sweep: overdue recheck plus distribution
    pub async fn run_frequent(&self) -> CoreResult<SweepReport> {
        let _gate = self.frequent_gate.lock().await;
        let now = self.service.clock().now_ms();
        let mut report = SweepReport::default();

        report.overdue_marked = self.service.mark_overdue(now).await?;

        // Pool occurrences whose distribution time has passed and due time
        // has not are handed to the assignment service
        let pool: Vec<Occurrence> = self
            .service
            .store()
            .list(&[Filter::eq("status", "pool")])
            .map_err(crate::error::CoreError::storage)?;
        for occurrence in pool {
            if occurrence.distribute_at > now || occurrence.due_at <= now {
                continue;
            }
            match self.service.assign_pool_occurrence(&occurrence.id).await {
                Ok(crate::assign::AssignOutcome::Assigned(_)) => report.assigned += 1,
                Ok(_) => report.blocked += 1,
                Err(e) => {
                    // Isolated: one bad occurrence never stops distribution
                    error!(occurrence_id = %occurrence.id, error = %e, "Assignment failed");
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }
}
