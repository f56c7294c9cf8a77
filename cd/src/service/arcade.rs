//! Arcade mode - timed, judged completion with dynamic leaderboard bonus
//!
//! Transitions: Active -(stop)-> Stopped -(approve/deny)-> Approved/Denied;
//! Denied -(continue)-> Active; Active|Stopped -(cancel)-> Cancelled.
//! Approval settles through the same completion/ledger path as ordinary
//! completions so the two paths stay reconcilable.

use chorestore::Filter;
use tracing::{debug, info};

use crate::clock::FAR_FUTURE_MS;
use crate::domain::{
    ArcadeCompletion, ArcadeSession, ArcadeState, AssignmentReason, BonusTier, LedgerReason, OccurrenceStatus,
};
use crate::error::{CoreError, CoreResult};
use crate::hooks::Hook;

use super::ChoreService;

impl ChoreService {
    // === Start ===

    /// Start an arcade session on an occurrence
    ///
    /// A pool occurrence is claimed first (counting against the daily claim
    /// limit). A person may hold only one active session at a time.
    pub async fn start_arcade(&self, occurrence_id: &str, person_id: &str) -> CoreResult<String> {
        if occurrence_id.trim().is_empty() || person_id.trim().is_empty() {
            return Err(CoreError::validation("Occurrence and person ids must not be empty"));
        }
        let person = self.persons().get_required(person_id).await?;
        if !person.is_capable() {
            return Err(CoreError::policy(format!("{} cannot hold assignments", person_id)));
        }
        if !self.active_sessions_for(person_id).await?.is_empty() {
            return Err(CoreError::policy(format!("{} already has an active arcade session", person_id)));
        }

        let _guard = self.locks().acquire(occurrence_id).await?;

        let mut occurrence = self.get_occurrence_required(occurrence_id).await?;
        if !occurrence.is_open() {
            return Err(CoreError::conflict(format!(
                "Occurrence {} is {}, not open",
                occurrence_id, occurrence.status
            )));
        }

        let open_sessions: Vec<ArcadeSession> = self
            .store()
            .list(&[Filter::eq("occurrence", occurrence_id)])
            .map_err(CoreError::storage)?;
        if open_sessions.iter().any(|s| !s.state.is_terminal()) {
            return Err(CoreError::conflict(format!(
                "Occurrence {} already has a session in flight",
                occurrence_id
            )));
        }

        let claimed_from_pool = match occurrence.status {
            OccurrenceStatus::Pool => {
                self.record_claim(person_id).await?;
                occurrence.assign(person_id, AssignmentReason::Claimed, self.clock().now_ms());
                let template_id = occurrence.template_id.clone();
                self.store().update(occurrence.clone()).map_err(CoreError::storage)?;
                self.hooks().emit(Hook::ChoreClaimed {
                    occurrence_id: occurrence_id.to_string(),
                    template_id,
                    person_id: person_id.to_string(),
                });
                true
            }
            OccurrenceStatus::Assigned => {
                if occurrence.assignee.as_deref() != Some(person_id) {
                    return Err(CoreError::conflict(format!(
                        "Occurrence {} is assigned to someone else",
                        occurrence_id
                    )));
                }
                false
            }
            _ => unreachable!("open status checked above"),
        };

        let session = ArcadeSession::start(
            occurrence_id,
            &occurrence.template_id,
            person_id,
            self.clock().now_ms(),
            claimed_from_pool,
        );
        let session_id = session.id.clone();
        self.store().create(session).map_err(CoreError::storage)?;

        info!(%session_id, %occurrence_id, %person_id, "Arcade session started");
        Ok(session_id)
    }

    // === Stop ===

    /// Stop the timer; the run awaits judgment
    pub async fn stop_arcade(&self, session_id: &str, actor_id: &str) -> CoreResult<()> {
        let session = self.get_session_required(session_id).await?;
        if session.person_id != actor_id {
            return Err(CoreError::policy("Only the runner may stop their session"));
        }

        let _guard = self.locks().acquire(&session.occurrence_id).await?;

        let mut session = self.get_session_required(session_id).await?;
        if session.state != ArcadeState::Active {
            return Err(CoreError::conflict(format!(
                "Session {} is {}, not active",
                session_id, session.state
            )));
        }

        session.stop(self.clock().now_ms());
        self.store().update(session).map_err(CoreError::storage)?;
        debug!(%session_id, "Arcade session stopped");
        Ok(())
    }

    // === Approve ===

    /// Approve a stopped run: rank it, award base + bonus, settle
    pub async fn approve_arcade(&self, session_id: &str, judge_id: &str) -> CoreResult<()> {
        let judge = self.persons().get_required(judge_id).await?;
        let session = self.get_session_required(session_id).await?;
        if session.person_id == judge.id {
            return Err(CoreError::policy("A session cannot be judged by its own runner"));
        }

        let _guard = self.locks().acquire(&session.occurrence_id).await?;

        let mut session = self.get_session_required(session_id).await?;
        if session.state != ArcadeState::Stopped {
            return Err(CoreError::conflict(format!(
                "Session {} is {}, not awaiting judgment",
                session_id, session.state
            )));
        }

        let mut occurrence = self.get_occurrence_required(&session.occurrence_id).await?;
        if !occurrence.is_open() {
            return Err(CoreError::conflict(format!(
                "Occurrence {} is {}, not open",
                occurrence.id, occurrence.status
            )));
        }
        let template = self.get_template_required(&occurrence.template_id).await?;
        let runner = self.persons().get_required(&session.person_id).await?;

        // Fail before any mutation if settlement would conflict
        let completions: Vec<crate::domain::Completion> = self
            .store()
            .list(&[Filter::eq("occurrence", occurrence.id.as_str())])
            .map_err(CoreError::storage)?;
        if completions.iter().any(|c| !c.undone) {
            return Err(CoreError::conflict(format!(
                "Occurrence {} already has an active completion",
                occurrence.id
            )));
        }

        // Rank against every finalized time for this template; rank is
        // computed by sorting, never read from a stored field
        let prior: Vec<ArcadeCompletion> = self
            .store()
            .list(&[Filter::eq("template", template.id.as_str())])
            .map_err(CoreError::storage)?;
        let rank = prior.iter().filter(|r| r.elapsed_ms < session.elapsed_ms).count() + 1;

        let settings = self.settings().current();
        let bonus = match rank {
            1 => BonusTier::AllTimeBest,
            2..=3 => BonusTier::TopThree,
            _ => BonusTier::None,
        };
        let total = match bonus {
            BonusTier::AllTimeBest => occurrence.points.with_bonus(settings.arcade_record_bonus),
            BonusTier::TopThree => occurrence.points.with_bonus(settings.arcade_top3_bonus),
            BonusTier::None => occurrence.points,
        };

        session.approve(judge_id);
        self.store().update(session.clone()).map_err(CoreError::storage)?;

        let result = ArcadeCompletion::new(&session, bonus);
        self.store().create(result).map_err(CoreError::storage)?;

        let now = self.clock().now_ms();
        let late = occurrence.due_at != FAR_FUTURE_MS && now > occurrence.due_at;
        let shares = vec![(runner.id.clone(), total)];
        self.settle(
            &mut occurrence,
            &template,
            &runner,
            now,
            late,
            shares,
            LedgerReason::ArcadeCompleted,
            true,
        )
        .await?;

        info!(
            %session_id,
            runner = %session.person_id,
            judge = %judge_id,
            rank,
            elapsed_ms = session.elapsed_ms,
            total = %total,
            "Arcade session approved"
        );
        if bonus == BonusTier::AllTimeBest {
            self.hooks().emit(Hook::ArcadeNewRecord {
                template_id: template.id.clone(),
                person_id: session.person_id.clone(),
                elapsed_ms: session.elapsed_ms,
            });
        }
        Ok(())
    }

    // === Deny ===

    /// Reject a stopped run; the runner may continue into a new attempt
    pub async fn deny_arcade(&self, session_id: &str, judge_id: &str) -> CoreResult<()> {
        let judge = self.persons().get_required(judge_id).await?;
        let session = self.get_session_required(session_id).await?;
        if session.person_id == judge.id {
            return Err(CoreError::policy("A session cannot be judged by its own runner"));
        }

        let _guard = self.locks().acquire(&session.occurrence_id).await?;

        let mut session = self.get_session_required(session_id).await?;
        if session.state != ArcadeState::Stopped {
            return Err(CoreError::conflict(format!(
                "Session {} is {}, not awaiting judgment",
                session_id, session.state
            )));
        }

        session.deny(judge_id);
        self.store().update(session).map_err(CoreError::storage)?;
        info!(%session_id, judge = %judge_id, "Arcade session denied");
        Ok(())
    }

    // === Continue ===

    /// Resume a denied session; elapsed time accumulates across attempts
    pub async fn continue_arcade(&self, session_id: &str, actor_id: &str) -> CoreResult<()> {
        let session = self.get_session_required(session_id).await?;
        if session.person_id != actor_id {
            return Err(CoreError::policy("Only the runner may continue their session"));
        }

        let _guard = self.locks().acquire(&session.occurrence_id).await?;

        let mut session = self.get_session_required(session_id).await?;
        if session.state != ArcadeState::Denied {
            return Err(CoreError::conflict(format!(
                "Session {} is {}, not denied",
                session_id, session.state
            )));
        }

        session.resume(self.clock().now_ms());
        self.store().update(session.clone()).map_err(CoreError::storage)?;
        info!(%session_id, attempt = session.attempt, "Arcade session continued");
        Ok(())
    }

    // === Cancel ===

    /// Abandon a session; a pool-claimed occurrence returns to the pool
    pub async fn cancel_arcade(&self, session_id: &str, actor_id: &str) -> CoreResult<()> {
        let actor = self.persons().get_required(actor_id).await?;
        let session = self.get_session_required(session_id).await?;
        if session.person_id != actor.id && !actor.admin {
            return Err(CoreError::policy("Only the runner or an administrator may cancel a session"));
        }

        let _guard = self.locks().acquire(&session.occurrence_id).await?;

        let mut session = self.get_session_required(session_id).await?;
        match session.state {
            ArcadeState::Active | ArcadeState::Stopped => {}
            ArcadeState::Approved => {
                return Err(CoreError::conflict("An approved session cannot be cancelled"));
            }
            ArcadeState::Denied => {
                return Err(CoreError::conflict("A denied session must be continued before it can change state"));
            }
            ArcadeState::Cancelled => {
                return Err(CoreError::conflict(format!("Session {} already cancelled", session_id)));
            }
        }

        session.cancel();
        self.store().update(session.clone()).map_err(CoreError::storage)?;

        if session.claimed_from_pool {
            let mut occurrence = self.get_occurrence_required(&session.occurrence_id).await?;
            if occurrence.status == OccurrenceStatus::Assigned
                && occurrence.assignee.as_deref() == Some(session.person_id.as_str())
            {
                occurrence.release_to_pool();
                self.store().update(occurrence).map_err(CoreError::storage)?;
            }
        }

        info!(%session_id, %actor_id, "Arcade session cancelled");
        Ok(())
    }

    // === Lookups ===

    pub async fn get_session_required(&self, id: &str) -> CoreResult<ArcadeSession> {
        self.store()
            .get(id)
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::not_found(format!("Arcade session {}", id)))
    }

    async fn active_sessions_for(&self, person_id: &str) -> CoreResult<Vec<ArcadeSession>> {
        self.store()
            .list(&[Filter::eq("person", person_id), Filter::eq("state", "active")])
            .map_err(CoreError::storage)
    }
}
