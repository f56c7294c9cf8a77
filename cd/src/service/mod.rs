//! ChoreService - the core's operation surface
//!
//! Owns the store handle, the row-lock table, the hook bus, and the seams
//! to external collaborators (clock, person directory, settings store).
//! Every state-changing operation takes the affected occurrence's row lock,
//! re-reads state under it, and only then mutates.

mod arcade;
mod completion;
mod sweeping;

use std::sync::Arc;
use std::time::Duration;

use chorestore::{Filter, Store};
use tracing::info;

use crate::clock::Clock;
use crate::config::LockSettings;
use crate::domain::{
    ArcadeCompletion, Balance, ChoreTemplate, ClaimCounter, LedgerEntry, Occurrence, ScheduleSpec,
};
use crate::error::{CoreError, CoreResult};
use crate::hooks::{Hook, HookBus};
use crate::locks::RowLocks;
use crate::points::Points;
use crate::recurrence::RuleMatcher;
use crate::settings::SettingsSource;

use crate::domain::PersonDirectory;

/// The core service
pub struct ChoreService {
    store: Arc<Store>,
    locks: RowLocks,
    hooks: Arc<HookBus>,
    clock: Arc<dyn Clock>,
    persons: Arc<dyn PersonDirectory>,
    settings: Arc<dyn SettingsSource>,
}

impl ChoreService {
    pub fn new(
        store: Arc<Store>,
        hooks: Arc<HookBus>,
        clock: Arc<dyn Clock>,
        persons: Arc<dyn PersonDirectory>,
        settings: Arc<dyn SettingsSource>,
        lock_settings: &LockSettings,
    ) -> Self {
        Self {
            store,
            locks: RowLocks::new(Duration::from_millis(lock_settings.wait_ms), lock_settings.retries),
            hooks,
            clock,
            persons,
            settings,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn locks(&self) -> &RowLocks {
        &self.locks
    }

    pub(crate) fn persons(&self) -> &dyn PersonDirectory {
        self.persons.as_ref()
    }

    pub(crate) fn settings(&self) -> &dyn SettingsSource {
        self.settings.as_ref()
    }

    // === Template registration ===

    /// Register a new template
    ///
    /// One-off templates materialize their single occurrence immediately;
    /// everything else waits for the daily sweep.
    pub async fn create_template(&self, template: ChoreTemplate) -> CoreResult<String> {
        if template.name.trim().is_empty() {
            return Err(CoreError::validation("Template name must not be empty"));
        }
        if template.points < Points::ZERO {
            return Err(CoreError::validation("Template points must not be negative"));
        }
        if let ScheduleSpec::Rule { expr } = &template.schedule {
            // Fail registration early instead of silently never scheduling
            RuleMatcher::parse(expr)?;
        }
        for edge in &template.depends_on {
            if edge.parent_id == template.id {
                return Err(CoreError::validation("Template cannot depend on itself"));
            }
            self.get_template_required(&edge.parent_id).await?;
        }

        let id = self.store.create(template.clone()).map_err(CoreError::storage)?;
        info!(template_id = %id, name = %template.name, "Template registered");

        if let ScheduleSpec::Once { due_on } = &template.schedule {
            if template.active && !template.is_dependency_child() {
                let now = self.clock.now_ms();
                let (due_at, distribute_at) = match due_on {
                    Some(date) => (
                        self.clock.day_end_ms(*date),
                        self.clock.time_on_date_ms(*date, template.distribute_minutes),
                    ),
                    None => (crate::clock::FAR_FUTURE_MS, now),
                };
                let occurrence = Occurrence::from_template(&template, due_at, distribute_at);
                self.store.create(occurrence).map_err(CoreError::storage)?;
            }
        }

        Ok(id)
    }

    // === Lookups ===

    pub async fn get_template_required(&self, id: &str) -> CoreResult<ChoreTemplate> {
        self.store
            .get(id)
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::not_found(format!("Template {}", id)))
    }

    pub async fn get_occurrence_required(&self, id: &str) -> CoreResult<Occurrence> {
        self.store
            .get(id)
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::not_found(format!("Occurrence {}", id)))
    }

    /// The open occurrence for a template, if one exists
    pub async fn open_occurrence_for(&self, template_id: &str) -> CoreResult<Option<Occurrence>> {
        let open: Vec<Occurrence> = self
            .store
            .list(&[Filter::eq("template", template_id), Filter::eq("open", true)])
            .map_err(CoreError::storage)?;
        Ok(open.into_iter().next())
    }

    // === Points queries ===

    /// Balance record for a person (zero if none recorded yet)
    pub async fn balance_of(&self, person_id: &str) -> CoreResult<Balance> {
        Ok(self
            .store
            .get(person_id)
            .map_err(CoreError::storage)?
            .unwrap_or_else(|| Balance::new(person_id)))
    }

    /// Ledger entries for a person, oldest first
    pub async fn ledger_for(&self, person_id: &str) -> CoreResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .store
            .list(&[Filter::eq("person", person_id)])
            .map_err(CoreError::storage)?;
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    /// Leaderboard: balances sorted by weekly points, then all-time
    pub async fn leaderboard(&self) -> CoreResult<Vec<Balance>> {
        let mut balances: Vec<Balance> = self.store.list(&[]).map_err(CoreError::storage)?;
        balances.sort_by(|a, b| {
            b.weekly
                .cmp(&a.weekly)
                .then(b.all_time.cmp(&a.all_time))
                .then(a.id.cmp(&b.id))
        });
        Ok(balances)
    }

    /// Ranked high scores for a template, fastest first
    ///
    /// Rank is a view computed by sorting, never a stored field.
    pub async fn high_scores(&self, template_id: &str) -> CoreResult<Vec<(usize, ArcadeCompletion)>> {
        let mut runs: Vec<ArcadeCompletion> = self
            .store
            .list(&[Filter::eq("template", template_id)])
            .map_err(CoreError::storage)?;
        runs.sort_by_key(|r| (r.elapsed_ms, r.created_at));
        Ok(runs.into_iter().enumerate().map(|(i, r)| (i + 1, r)).collect())
    }

    // === Weekly reset ===

    /// Zero every weekly counter; all-time balances are untouched
    pub async fn reset_weekly_points(&self, actor: &str) -> CoreResult<u32> {
        let person = self.persons.get_required(actor).await?;
        if !person.admin {
            return Err(CoreError::policy("Only administrators may reset weekly points"));
        }

        let balances: Vec<Balance> = self.store.list(&[]).map_err(CoreError::storage)?;
        let mut reset = 0;
        for mut balance in balances {
            balance.reset_weekly();
            self.store.update(balance).map_err(CoreError::storage)?;
            reset += 1;
        }

        info!(%actor, reset, "Weekly points reset");
        self.hooks.emit(Hook::WeeklyReset { persons: reset });
        Ok(reset)
    }

    // === Claim counters ===

    /// Claims made by a person on the given local date
    pub(crate) async fn claim_count(&self, person_id: &str) -> CoreResult<u32> {
        let today = self.clock.local_date();
        let counter: Option<ClaimCounter> = self.store.get(person_id).map_err(CoreError::storage)?;
        Ok(counter.map(|c| c.count_on(today)).unwrap_or(0))
    }

    /// Enforce the daily claim limit and record one claim
    ///
    /// Takes the person's row lock so concurrent claims cannot lose an
    /// increment or slip past the limit together.
    pub(crate) async fn record_claim(&self, person_id: &str) -> CoreResult<()> {
        let _guard = self.locks.acquire(&format!("person:{}", person_id)).await?;

        let today = self.clock.local_date();
        let limit = self.settings.current().daily_claim_limit;

        let existing: Option<ClaimCounter> = self.store.get(person_id).map_err(CoreError::storage)?;
        match existing {
            Some(mut counter) => {
                if counter.count_on(today) >= limit {
                    return Err(CoreError::policy(format!(
                        "Daily claim limit of {} reached for {}",
                        limit, person_id
                    )));
                }
                counter.increment_on(today);
                self.store.update(counter).map_err(CoreError::storage)?;
            }
            None => {
                if limit == 0 {
                    return Err(CoreError::policy(format!("Daily claim limit of 0 reached for {}", person_id)));
                }
                let mut counter = ClaimCounter::new(person_id, today);
                counter.increment_on(today);
                self.store.create(counter).map_err(CoreError::storage)?;
            }
        }
        Ok(())
    }
}
