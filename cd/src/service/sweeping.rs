//! Sweep operations - occurrence creation, overdue marking, archival
//!
//! These are invoked by the Sweeper loop and callable on demand for
//! manual runs. Per-template failures are isolated: one bad template
//! never aborts the sweep for the rest.

use chorestore::Filter;
use chrono::NaiveDate;
use tracing::{debug, error, info};

use crate::assign::AssignOutcome;
use crate::domain::{ChoreTemplate, ClaimCounter, Occurrence, ScheduleSpec, SweepKind, SweepLog, SweepReport};
use crate::error::{CoreError, CoreResult};
use crate::hooks::Hook;
use crate::recurrence::due_on;

use super::ChoreService;

impl ChoreService {
    // === Overdue marking ===

    /// Mark open occurrences past their due time as overdue
    ///
    /// The overdue hook fires once per transition, not on every sweep.
    pub async fn mark_overdue(&self, now_ms: i64) -> CoreResult<u32> {
        let open: Vec<Occurrence> = self
            .store()
            .list(&[Filter::eq("open", true)])
            .map_err(CoreError::storage)?;

        let mut marked = 0;
        for candidate in open {
            if candidate.overdue || candidate.due_at >= now_ms {
                continue;
            }

            let _guard = self.locks().acquire(&candidate.id).await?;
            let mut occurrence = self.get_occurrence_required(&candidate.id).await?;
            // Re-verify under the lock; a racing completion wins
            if occurrence.overdue || !occurrence.is_open() || occurrence.due_at >= now_ms {
                continue;
            }

            occurrence.mark_overdue();
            let template_id = occurrence.template_id.clone();
            let occurrence_id = occurrence.id.clone();
            self.store().update(occurrence).map_err(CoreError::storage)?;

            debug!(%occurrence_id, "Occurrence overdue");
            self.hooks().emit(Hook::ChoreOverdue {
                occurrence_id,
                template_id,
            });
            marked += 1;
        }
        Ok(marked)
    }

    // === Occurrence creation ===

    /// Create occurrences for every template due on `date`
    pub async fn create_due_occurrences(&self, date: NaiveDate) -> CoreResult<SweepReport> {
        let templates: Vec<ChoreTemplate> = self
            .store()
            .list(&[Filter::eq("active", true)])
            .map_err(CoreError::storage)?;

        let mut report = SweepReport::default();
        for template in templates {
            // Children only ever spawn from their parent's completion
            if template.is_dependency_child() {
                continue;
            }

            match self.sweep_one_template(&template, date).await {
                Ok(one) => report.merge(&one),
                Err(e) => {
                    error!(template_id = %template.id, error = %e, "Template sweep failed");
                    report.failures += 1;
                }
            }
        }
        Ok(report)
    }

    async fn sweep_one_template(&self, template: &ChoreTemplate, date: NaiveDate) -> CoreResult<SweepReport> {
        let mut report = SweepReport::default();

        let creation_date = self.clock().local_date_of(template.created_at);
        if !due_on(template, date, creation_date) {
            return Ok(report);
        }

        // The reschedule override is consumed the day it fires, whether or
        // not creation turns out to be a no-op
        if template.reschedule_to == Some(date) {
            let mut fresh = self.get_template_required(&template.id).await?;
            fresh.clear_reschedule();
            self.store().update(fresh).map_err(CoreError::storage)?;
        }

        let Some(occurrence) = self.materialize_occurrence(template, date).await? else {
            return Ok(report);
        };
        report.created += 1;

        // Undesirable pool chores are assigned immediately rather than
        // waiting for the frequent sweep
        if template.undesirable && template.pool {
            match self.assign_pool_occurrence(&occurrence.id).await? {
                AssignOutcome::Assigned(_) => report.assigned += 1,
                _ => report.blocked += 1,
            }
        }

        Ok(report)
    }

    /// Create the occurrence for a template on a date, unless one is open
    ///
    /// Takes the template's row lock so a racing sweep or backdated
    /// completion cannot double-create.
    pub(crate) async fn materialize_occurrence(
        &self,
        template: &ChoreTemplate,
        date: NaiveDate,
    ) -> CoreResult<Option<Occurrence>> {
        let _guard = self.locks().acquire(&template.id).await?;

        if self.open_occurrence_for(&template.id).await?.is_some() {
            debug!(template_id = %template.id, "Open occurrence exists, creation is a no-op");
            return Ok(None);
        }

        let due_at = self.clock().day_end_ms(date);
        let distribute_at = self.clock().time_on_date_ms(date, template.distribute_minutes);
        let occurrence = Occurrence::from_template(template, due_at, distribute_at);
        self.store().create(occurrence.clone()).map_err(CoreError::storage)?;

        info!(template_id = %template.id, occurrence_id = %occurrence.id, %date, "Occurrence created");
        Ok(Some(occurrence))
    }

    // === Claim counter reset ===

    /// Roll every claim counter to the new local day
    pub async fn reset_claim_counters(&self, today: NaiveDate) -> CoreResult<u32> {
        let counters: Vec<ClaimCounter> = self.store().list(&[]).map_err(CoreError::storage)?;
        let mut reset = 0;
        for mut counter in counters {
            if counter.date == today {
                continue;
            }
            counter.reset_to(today);
            self.store().update(counter).map_err(CoreError::storage)?;
            reset += 1;
        }
        Ok(reset)
    }

    // === One-off archival ===

    /// Archive one-off templates completed longer than the grace window ago
    pub async fn archive_stale_one_offs(&self, now_ms: i64, grace_days: i64) -> CoreResult<u32> {
        let templates: Vec<ChoreTemplate> = self
            .store()
            .list(&[Filter::eq("active", true)])
            .map_err(CoreError::storage)?;

        let grace_ms = grace_days * 24 * 3_600_000;
        let mut archived = 0;
        for template in templates {
            if !matches!(template.schedule, ScheduleSpec::Once { .. }) {
                continue;
            }

            let occurrences: Vec<Occurrence> = self
                .store()
                .list(&[Filter::eq("template", template.id.as_str())])
                .map_err(CoreError::storage)?;
            if occurrences.is_empty() || occurrences.iter().any(|o| o.is_open()) {
                continue;
            }
            let last_completed = occurrences.iter().filter_map(|o| o.completed_at).max();
            let Some(last_completed) = last_completed else {
                continue;
            };

            if now_ms - last_completed > grace_ms {
                let mut fresh = self.get_template_required(&template.id).await?;
                fresh.archive();
                self.store().update(fresh).map_err(CoreError::storage)?;
                info!(template_id = %template.id, "One-off template archived");
                archived += 1;
            }
        }
        Ok(archived)
    }

    // === Sweep logs ===

    /// Record a sweep run for operators and the watchdog
    pub async fn record_sweep_log(
        &self,
        kind: SweepKind,
        local_date: NaiveDate,
        started_at: i64,
        finished_at: i64,
        success: bool,
        report: SweepReport,
    ) -> CoreResult<()> {
        let log = SweepLog::new(kind, local_date, started_at, finished_at, success, report);
        self.store().create(log).map_err(CoreError::storage)?;
        Ok(())
    }

    /// Has a daily sweep succeeded for this local date?
    pub async fn daily_sweep_succeeded(&self, date: NaiveDate) -> CoreResult<bool> {
        let logs = self.daily_sweep_logs(date).await?;
        Ok(logs.iter().any(|l| l.success))
    }

    /// How many daily-sweep attempts (any outcome) ran for this date?
    pub async fn daily_sweep_attempts(&self, date: NaiveDate) -> CoreResult<u32> {
        Ok(self.daily_sweep_logs(date).await?.len() as u32)
    }

    async fn daily_sweep_logs(&self, date: NaiveDate) -> CoreResult<Vec<SweepLog>> {
        self.store()
            .list(&[
                Filter::eq("kind", "daily"),
                Filter::eq("date", date.to_string()),
            ])
            .map_err(CoreError::storage)
    }
}
