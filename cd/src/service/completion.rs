//! Claim, complete, undo, skip - and the dependent-task spawner
//!
//! Completion is the transactional heart: one Completion record, its
//! shares, mirrored ledger entries, rotation advancement, and child
//! spawning all happen under the occurrence's row lock.

use chorestore::Filter;
use tracing::{debug, info, warn};

use crate::clock::FAR_FUTURE_MS;
use crate::domain::{
    AssignmentReason, ChoreTemplate, Completion, CompletionShare, LedgerEntry, LedgerReason, Occurrence,
    OccurrenceStatus, Person,
};
use crate::error::{CoreError, CoreResult};
use crate::hooks::Hook;
use crate::ledger::{resolve_credited, split_shares};
use crate::points::Points;
use crate::recurrence::due_on;

use super::ChoreService;

impl ChoreService {
    // === Claim ===

    /// Claim a pool occurrence for a person
    ///
    /// Exactly one of two racing claims succeeds; the loser observes the
    /// changed state under the lock and gets a conflict.
    pub async fn claim_occurrence(&self, occurrence_id: &str, person_id: &str) -> CoreResult<()> {
        if occurrence_id.trim().is_empty() || person_id.trim().is_empty() {
            return Err(CoreError::validation("Occurrence and person ids must not be empty"));
        }
        let person = self.persons().get_required(person_id).await?;
        if !person.is_capable() {
            return Err(CoreError::policy(format!("{} cannot hold assignments", person_id)));
        }

        let _guard = self.locks().acquire(occurrence_id).await?;

        let mut occurrence = self.get_occurrence_required(occurrence_id).await?;
        if occurrence.status != OccurrenceStatus::Pool {
            return Err(CoreError::conflict(format!(
                "Occurrence {} is {}, not claimable",
                occurrence_id, occurrence.status
            )));
        }

        self.record_claim(person_id).await?;

        occurrence.assign(person_id, AssignmentReason::Claimed, self.clock().now_ms());
        let template_id = occurrence.template_id.clone();
        self.store().update(occurrence).map_err(CoreError::storage)?;

        info!(%occurrence_id, %person_id, "Occurrence claimed");
        self.hooks().emit(Hook::ChoreClaimed {
            occurrence_id: occurrence_id.to_string(),
            template_id,
            person_id: person_id.to_string(),
        });
        Ok(())
    }

    // === Complete ===

    /// Complete an occurrence now
    pub async fn complete_occurrence(
        &self,
        occurrence_id: &str,
        completer_id: &str,
        helpers: Option<Vec<String>>,
    ) -> CoreResult<String> {
        let now = self.clock().now_ms();
        self.complete_occurrence_at(occurrence_id, completer_id, helpers, now).await
    }

    /// Complete an occurrence with an explicit (possibly backdated) timestamp
    pub async fn complete_occurrence_at(
        &self,
        occurrence_id: &str,
        completer_id: &str,
        helpers: Option<Vec<String>>,
        completed_at: i64,
    ) -> CoreResult<String> {
        if occurrence_id.trim().is_empty() || completer_id.trim().is_empty() {
            return Err(CoreError::validation("Occurrence and completer ids must not be empty"));
        }
        if completed_at > self.clock().now_ms() {
            return Err(CoreError::validation("Completion time cannot be in the future"));
        }
        let completer = self.persons().get_required(completer_id).await?;

        // Resolve helper ids before taking the lock
        let explicit_helpers = match helpers {
            Some(ids) => {
                let mut resolved = Vec::with_capacity(ids.len());
                for id in ids {
                    resolved.push(self.persons().get_required(&id).await?);
                }
                Some(resolved)
            }
            None => None,
        };

        let _guard = self.locks().acquire(occurrence_id).await?;

        let mut occurrence = self.get_occurrence_required(occurrence_id).await?;
        if !occurrence.is_open() {
            return Err(CoreError::conflict(format!(
                "Occurrence {} is {}, not open",
                occurrence_id, occurrence.status
            )));
        }
        let template = self.get_template_required(&occurrence.template_id).await?;

        let late = occurrence.due_at != FAR_FUTURE_MS && completed_at > occurrence.due_at;

        let eligible_persons = self.resolve_persons(&template.eligible).await?;
        let household = self.persons().capable().await?;
        let credited = resolve_credited(&template, &completer, explicit_helpers, eligible_persons, household);
        let shares = split_shares(occurrence.points, &credited);

        let completion = self
            .settle(
                &mut occurrence,
                &template,
                &completer,
                completed_at,
                late,
                shares,
                LedgerReason::ChoreCompleted,
                false,
            )
            .await?;

        Ok(completion.id)
    }

    /// Shared settlement: completion record, shares, ledger, rotation,
    /// occurrence transition, hook, child spawning, backdate respawn.
    ///
    /// Callers hold the occurrence's row lock.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn settle(
        &self,
        occurrence: &mut Occurrence,
        template: &ChoreTemplate,
        completer: &Person,
        completed_at: i64,
        late: bool,
        shares: Vec<(String, Points)>,
        reason: LedgerReason,
        reuse_undone: bool,
    ) -> CoreResult<Completion> {
        // Exactly one active completion may exist per occurrence
        let existing: Vec<Completion> = self
            .store()
            .list(&[Filter::eq("occurrence", occurrence.id.as_str())])
            .map_err(CoreError::storage)?;
        if existing.iter().any(|c| !c.undone) {
            return Err(CoreError::conflict(format!(
                "Occurrence {} already has an active completion",
                occurrence.id
            )));
        }

        let arcade = reason == LedgerReason::ArcadeCompleted;
        let completion = match existing.into_iter().find(|c| c.undone) {
            Some(mut undone) if reuse_undone => {
                undone.reuse_for_arcade(&completer.id, completed_at, late);
                self.store().update(undone.clone()).map_err(CoreError::storage)?;
                undone
            }
            _ => {
                let completion = Completion::new(&occurrence.id, &template.id, &completer.id, completed_at, late)
                    .with_arcade(arcade);
                self.store().create(completion.clone()).map_err(CoreError::storage)?;
                completion
            }
        };

        for (person_id, points) in &shares {
            let share = CompletionShare::new(&completion.id, person_id, *points);
            self.store().create(share).map_err(CoreError::storage)?;
            self.credit(person_id, *points, Some(completion.id.clone()), reason, &completer.id)
                .await?;
        }

        self.advance_rotation(&template.id, &completer.id, completed_at).await?;

        occurrence.complete(&completer.id, completed_at, late);
        self.store().update(occurrence.clone()).map_err(CoreError::storage)?;

        info!(
            occurrence_id = %occurrence.id,
            completion_id = %completion.id,
            completer = %completer.id,
            shares = shares.len(),
            %late,
            "Occurrence completed"
        );
        self.hooks().emit(Hook::ChoreCompleted {
            occurrence_id: occurrence.id.clone(),
            template_id: template.id.clone(),
            completion_id: completion.id.clone(),
            completed_by: completer.id.clone(),
            points: occurrence.points,
            late,
        });

        self.spawn_children(&template.id, &completer.id, completed_at).await?;
        self.respawn_after_backdate(template, completed_at).await?;

        Ok(completion)
    }

    /// Apply a signed delta to a person's balances with a ledger entry
    pub(crate) async fn credit(
        &self,
        person_id: &str,
        delta: Points,
        completion_id: Option<String>,
        reason: LedgerReason,
        actor: &str,
    ) -> CoreResult<()> {
        let _guard = self.locks().acquire(&format!("person:{}", person_id)).await?;

        let existing: Option<crate::domain::Balance> = self.store().get(person_id).map_err(CoreError::storage)?;
        let balance_after = match existing {
            Some(mut balance) => {
                balance.apply(delta);
                let after = balance.all_time;
                self.store().update(balance).map_err(CoreError::storage)?;
                after
            }
            None => {
                let mut balance = crate::domain::Balance::new(person_id);
                balance.apply(delta);
                let after = balance.all_time;
                self.store().create(balance).map_err(CoreError::storage)?;
                after
            }
        };

        let entry = LedgerEntry::new(person_id, delta, balance_after, completion_id, reason, actor);
        self.store().create(entry).map_err(CoreError::storage)?;
        Ok(())
    }

    async fn advance_rotation(&self, template_id: &str, person_id: &str, completed_at: i64) -> CoreResult<()> {
        let _guard = self.locks().acquire(&format!("person:{}", person_id)).await?;

        let date = self.clock().local_date_of(completed_at);
        let key = crate::domain::RotationState::key(template_id, person_id);
        match self
            .store()
            .get::<crate::domain::RotationState>(&key)
            .map_err(CoreError::storage)?
        {
            Some(mut state) => {
                state.advance_to(date);
                self.store().update(state).map_err(CoreError::storage)?;
            }
            None => {
                let state = crate::domain::RotationState::new(template_id, person_id, date);
                self.store().create(state).map_err(CoreError::storage)?;
            }
        }
        Ok(())
    }

    // === Dependent-task spawner ===

    /// Materialize child occurrences on the parent's completer
    ///
    /// Children bypass the pool deliberately: whoever finished the parent
    /// owns the follow-up, whatever the child template's own defaults say.
    pub(crate) async fn spawn_children(
        &self,
        parent_template_id: &str,
        completer_id: &str,
        completed_at: i64,
    ) -> CoreResult<u32> {
        let templates: Vec<ChoreTemplate> = self.store().list(&[]).map_err(CoreError::storage)?;

        let mut spawned = 0;
        for child in templates {
            let Some(edge) = child.depends_on.iter().find(|e| e.parent_id == parent_template_id) else {
                continue;
            };
            if !child.active || child.is_archived() {
                continue;
            }

            let _guard = self.locks().acquire(&child.id).await?;
            if self.open_occurrence_for(&child.id).await?.is_some() {
                debug!(child_id = %child.id, "Child already has an open occurrence, not spawning");
                continue;
            }

            let due_at = completed_at + (edge.offset_hours as i64) * 3_600_000;
            let due_date = self.clock().local_date_of(due_at);
            let distribute_at = self.clock().time_on_date_ms(due_date, child.distribute_minutes);

            let mut occurrence = Occurrence::from_template(&child, due_at, distribute_at);
            occurrence.assign(completer_id, AssignmentReason::ParentCompletion, self.clock().now_ms());
            let occurrence_id = occurrence.id.clone();
            self.store().create(occurrence).map_err(CoreError::storage)?;

            info!(child_id = %child.id, %occurrence_id, %completer_id, "Child occurrence spawned");
            self.hooks().emit(Hook::ChoreAssigned {
                occurrence_id,
                template_id: child.id.clone(),
                person_id: completer_id.to_string(),
            });
            spawned += 1;
        }
        Ok(spawned)
    }

    /// A completion backdated to exactly yesterday re-runs today's creation
    async fn respawn_after_backdate(&self, template: &ChoreTemplate, completed_at: i64) -> CoreResult<()> {
        let today = self.clock().local_date();
        let completed_on = self.clock().local_date_of(completed_at);
        if completed_on.succ_opt() != Some(today) {
            return Ok(());
        }
        if !template.active || template.is_archived() || template.is_dependency_child() {
            return Ok(());
        }
        let creation_date = self.clock().local_date_of(template.created_at);
        if !due_on(template, today, creation_date) {
            return Ok(());
        }
        if self.materialize_occurrence(template, today).await?.is_some() {
            info!(template_id = %template.id, "Backdated completion respawned today's occurrence");
        }
        Ok(())
    }

    // === Undo ===

    /// Reverse a completion's points and restore the occurrence
    ///
    /// Administrator-only; bounded by the undo window measured from the
    /// completion time. The completion and its shares stay on record.
    pub async fn undo_completion(&self, completion_id: &str, actor_id: &str) -> CoreResult<()> {
        if completion_id.trim().is_empty() || actor_id.trim().is_empty() {
            return Err(CoreError::validation("Completion and actor ids must not be empty"));
        }
        let actor = self.persons().get_required(actor_id).await?;
        if !actor.admin {
            return Err(CoreError::policy("Only administrators may undo completions"));
        }

        let completion: Completion = self
            .store()
            .get(completion_id)
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::not_found(format!("Completion {}", completion_id)))?;

        let _guard = self.locks().acquire(&completion.occurrence_id).await?;

        // Re-read under the lock
        let mut completion: Completion = self
            .store()
            .get(completion_id)
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::not_found(format!("Completion {}", completion_id)))?;
        if completion.undone {
            return Err(CoreError::conflict(format!("Completion {} already undone", completion_id)));
        }

        let window_ms = self.settings().current().undo_window_hours * 3_600_000;
        let now = self.clock().now_ms();
        if now - completion.completed_at > window_ms {
            return Err(CoreError::policy("Undo window expired"));
        }

        let shares: Vec<CompletionShare> = self
            .store()
            .list(&[Filter::eq("completion", completion_id)])
            .map_err(CoreError::storage)?;
        for share in &shares {
            self.credit(
                &share.person_id,
                -share.points,
                Some(completion.id.clone()),
                LedgerReason::Undo,
                actor_id,
            )
            .await?;
        }

        completion.mark_undone(actor_id, now);
        self.store().update(completion.clone()).map_err(CoreError::storage)?;

        let mut occurrence = self.get_occurrence_required(&completion.occurrence_id).await?;
        let template = self.get_template_required(&occurrence.template_id).await?;
        if template.pool {
            occurrence.release_to_pool();
        } else {
            let holder = occurrence
                .assignee
                .clone()
                .unwrap_or_else(|| completion.completed_by.clone());
            occurrence.restore_assigned(holder);
        }
        self.store().update(occurrence).map_err(CoreError::storage)?;

        info!(%completion_id, %actor_id, reversed = shares.len(), "Completion undone");
        Ok(())
    }

    // === Skip ===

    /// Waive an open occurrence without awarding points
    pub async fn skip_occurrence(&self, occurrence_id: &str, actor_id: &str, note: Option<String>) -> CoreResult<()> {
        let actor = self.persons().get_required(actor_id).await?;
        if !actor.admin {
            return Err(CoreError::policy("Only administrators may skip occurrences"));
        }

        let _guard = self.locks().acquire(occurrence_id).await?;

        let mut occurrence = self.get_occurrence_required(occurrence_id).await?;
        if !occurrence.is_open() {
            return Err(CoreError::conflict(format!(
                "Occurrence {} is {}, not open",
                occurrence_id, occurrence.status
            )));
        }

        occurrence.skip(actor_id, self.clock().now_ms(), note);
        self.store().update(occurrence).map_err(CoreError::storage)?;
        info!(%occurrence_id, %actor_id, "Occurrence skipped");
        Ok(())
    }

    /// Resolve a list of person ids, skipping (with a warning) any that
    /// have left the directory
    pub(crate) async fn resolve_persons(&self, ids: &[String]) -> CoreResult<Vec<Person>> {
        let mut persons = Vec::with_capacity(ids.len());
        for id in ids {
            match self.persons().get(id).await? {
                Some(person) => persons.push(person),
                None => warn!(person_id = %id, "Eligibility entry references unknown person"),
            }
        }
        Ok(persons)
    }
}
