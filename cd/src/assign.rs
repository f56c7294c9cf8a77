//! Rotation/fairness assignment
//!
//! Picks which eligible person receives a pool occurrence at distribution
//! time. The outcome is a closed set of reasons, not a boolean: callers
//! react differently to a rotation block (self-resolves tomorrow) than to
//! an empty candidate set (needs configuration changes).

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use chorestore::Filter;
use tracing::{debug, info};

use crate::domain::{AssignmentReason, Occurrence, OccurrenceStatus, Person};
use crate::error::{CoreError, CoreResult};
use crate::hooks::Hook;
use crate::service::ChoreService;

/// Outcome of one assignment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// Assigned to this person
    Assigned(String),
    /// The candidate set is structurally empty; needs configuration changes
    NoEligible,
    /// Every candidate completed this chore yesterday; resolves tomorrow
    RotationBlocked,
    /// Remaining candidates already hold another difficult chore today
    DifficultLimitBlocked,
}

/// Pick the fairest assignee from a candidate set
///
/// Filters are applied in a fixed order: rotation first, then the
/// difficult-chore cap. `RotationBlocked` is reported only when rotation
/// alone empties a non-empty set; when candidates survive rotation and the
/// difficult filter then empties the set, `DifficultLimitBlocked` wins.
/// The winner is the candidate with the oldest (or absent) last-completed
/// date; ties break by person id.
pub fn pick_assignee(
    difficult: bool,
    candidates: &[Person],
    last_completed: &HashMap<String, NaiveDate>,
    difficult_holders: &HashSet<String>,
    today: NaiveDate,
) -> AssignOutcome {
    if candidates.is_empty() {
        return AssignOutcome::NoEligible;
    }

    let yesterday = today.pred_opt();
    let after_rotation: Vec<&Person> = candidates
        .iter()
        .filter(|p| last_completed.get(&p.id).copied() != yesterday)
        .collect();

    if after_rotation.is_empty() {
        return AssignOutcome::RotationBlocked;
    }

    let survivors: Vec<&Person> = if difficult {
        after_rotation
            .iter()
            .filter(|p| !difficult_holders.contains(&p.id))
            .copied()
            .collect()
    } else {
        after_rotation
    };

    if survivors.is_empty() {
        return AssignOutcome::DifficultLimitBlocked;
    }

    let winner = survivors
        .into_iter()
        .min_by_key(|p| (last_completed.get(&p.id).copied(), p.id.clone()))
        .expect("non-empty survivor set");

    AssignOutcome::Assigned(winner.id.clone())
}

impl ChoreService {
    /// Assign a pool occurrence to the fairest eligible person
    pub async fn assign_pool_occurrence(&self, occurrence_id: &str) -> CoreResult<AssignOutcome> {
        if occurrence_id.trim().is_empty() {
            return Err(CoreError::validation("Occurrence id must not be empty"));
        }

        let _guard = self.locks().acquire(occurrence_id).await?;

        let mut occurrence = self.get_occurrence_required(occurrence_id).await?;
        if occurrence.status != OccurrenceStatus::Pool {
            return Err(CoreError::conflict(format!(
                "Occurrence {} is {}, not pool",
                occurrence_id, occurrence.status
            )));
        }

        let template = self.get_template_required(&occurrence.template_id).await?;
        let today = self.clock().local_date();

        // Candidate set: eligibility list for undesirable chores (when one
        // is configured), otherwise every auto-assignable person
        let mut candidates: Vec<Person> = self
            .persons()
            .capable()
            .await?
            .into_iter()
            .filter(|p| p.is_auto_assignable())
            .collect();
        if template.undesirable && !template.eligible.is_empty() {
            candidates.retain(|p| template.eligible.contains(&p.id));
        }
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let last_completed = self.rotation_dates(&template.id).await?;
        let difficult_holders = if template.difficult {
            self.difficult_holders_today(&template.id, today).await?
        } else {
            HashSet::new()
        };

        let outcome = pick_assignee(template.difficult, &candidates, &last_completed, &difficult_holders, today);

        match &outcome {
            AssignOutcome::Assigned(person_id) => {
                occurrence.assign(person_id.clone(), AssignmentReason::Auto, self.clock().now_ms());
                self.store().update(occurrence).map_err(CoreError::storage)?;
                info!(%occurrence_id, %person_id, template_id = %template.id, "Occurrence auto-assigned");
                self.hooks().emit(Hook::ChoreAssigned {
                    occurrence_id: occurrence_id.to_string(),
                    template_id: template.id.clone(),
                    person_id: person_id.clone(),
                });
            }
            AssignOutcome::NoEligible => {
                occurrence.mark_blocked(AssignmentReason::NoneEligible);
                self.store().update(occurrence).map_err(CoreError::storage)?;
                debug!(%occurrence_id, "Assignment blocked: no eligible persons");
            }
            AssignOutcome::RotationBlocked => {
                occurrence.mark_blocked(AssignmentReason::AllCompletedYesterday);
                self.store().update(occurrence).map_err(CoreError::storage)?;
                debug!(%occurrence_id, "Assignment blocked: rotation");
            }
            AssignOutcome::DifficultLimitBlocked => {
                occurrence.mark_blocked(AssignmentReason::DifficultLimit);
                self.store().update(occurrence).map_err(CoreError::storage)?;
                debug!(%occurrence_id, "Assignment blocked: difficult-chore limit");
            }
        }

        Ok(outcome)
    }

    /// Last-completed dates for a template, by person
    async fn rotation_dates(&self, template_id: &str) -> CoreResult<HashMap<String, NaiveDate>> {
        let states: Vec<crate::domain::RotationState> = self
            .store()
            .list(&[Filter::eq("template", template_id)])
            .map_err(CoreError::storage)?;
        Ok(states.into_iter().map(|s| (s.person_id, s.last_completed_on)).collect())
    }

    /// Persons already holding a different difficult chore due today
    async fn difficult_holders_today(&self, template_id: &str, today: NaiveDate) -> CoreResult<HashSet<String>> {
        let assigned: Vec<Occurrence> = self
            .store()
            .list(&[Filter::eq("status", "assigned")])
            .map_err(CoreError::storage)?;

        let mut holders = HashSet::new();
        for occurrence in assigned {
            if occurrence.template_id == template_id {
                continue;
            }
            let Some(assignee) = &occurrence.assignee else {
                continue;
            };
            if self.clock().local_date_of(occurrence.due_at) != today {
                continue;
            }
            let template = self.get_template_required(&occurrence.template_id).await?;
            if template.difficult {
                holders.insert(assignee.clone());
            }
        }
        Ok(holders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn person(id: &str) -> Person {
        Person::new(id, id)
    }

    #[test]
    fn test_never_completed_beats_yesterday() {
        let today = date(2026, 3, 10);
        let candidates = vec![person("alice"), person("bob")];
        let mut last = HashMap::new();
        last.insert("alice".to_string(), date(2026, 3, 9));

        let outcome = pick_assignee(false, &candidates, &last, &HashSet::new(), today);
        assert_eq!(outcome, AssignOutcome::Assigned("bob".to_string()));
    }

    #[test]
    fn test_all_completed_yesterday_blocks() {
        let today = date(2026, 3, 10);
        let candidates = vec![person("alice"), person("bob")];
        let mut last = HashMap::new();
        last.insert("alice".to_string(), date(2026, 3, 9));
        last.insert("bob".to_string(), date(2026, 3, 9));

        let outcome = pick_assignee(false, &candidates, &last, &HashSet::new(), today);
        assert_eq!(outcome, AssignOutcome::RotationBlocked);
    }

    #[test]
    fn test_oldest_date_wins() {
        let today = date(2026, 3, 10);
        let candidates = vec![person("alice"), person("bob")];
        let mut last = HashMap::new();
        last.insert("alice".to_string(), date(2026, 3, 1));
        last.insert("bob".to_string(), date(2026, 3, 5));

        let outcome = pick_assignee(false, &candidates, &last, &HashSet::new(), today);
        assert_eq!(outcome, AssignOutcome::Assigned("alice".to_string()));
    }

    #[test]
    fn test_tie_breaks_by_id() {
        let today = date(2026, 3, 10);
        let candidates = vec![person("zoe"), person("alice")];
        let mut last = HashMap::new();
        last.insert("zoe".to_string(), date(2026, 3, 1));
        last.insert("alice".to_string(), date(2026, 3, 1));

        let outcome = pick_assignee(false, &candidates, &last, &HashSet::new(), today);
        assert_eq!(outcome, AssignOutcome::Assigned("alice".to_string()));
    }

    #[test]
    fn test_empty_candidates_no_eligible() {
        let outcome = pick_assignee(false, &[], &HashMap::new(), &HashSet::new(), date(2026, 3, 10));
        assert_eq!(outcome, AssignOutcome::NoEligible);
    }

    #[test]
    fn test_difficult_limit_blocks_with_specific_reason() {
        let today = date(2026, 3, 10);
        let candidates = vec![person("alice")];
        let mut holders = HashSet::new();
        holders.insert("alice".to_string());

        let outcome = pick_assignee(true, &candidates, &HashMap::new(), &holders, today);
        assert_eq!(outcome, AssignOutcome::DifficultLimitBlocked);
    }

    #[test]
    fn test_difficult_filter_picks_free_candidate() {
        let today = date(2026, 3, 10);
        let candidates = vec![person("alice"), person("bob")];
        let mut holders = HashSet::new();
        holders.insert("alice".to_string());

        let outcome = pick_assignee(true, &candidates, &HashMap::new(), &holders, today);
        assert_eq!(outcome, AssignOutcome::Assigned("bob".to_string()));
    }

    #[test]
    fn test_rotation_block_takes_precedence_when_rotation_empties() {
        // Rotation alone empties the set: reported as RotationBlocked even
        // though the survivor would also have hit the difficult cap
        let today = date(2026, 3, 10);
        let candidates = vec![person("alice")];
        let mut last = HashMap::new();
        last.insert("alice".to_string(), date(2026, 3, 9));
        let mut holders = HashSet::new();
        holders.insert("alice".to_string());

        let outcome = pick_assignee(true, &candidates, &last, &holders, today);
        assert_eq!(outcome, AssignOutcome::RotationBlocked);
    }

    #[test]
    fn test_non_difficult_ignores_holders() {
        let today = date(2026, 3, 10);
        let candidates = vec![person("alice")];
        let mut holders = HashSet::new();
        holders.insert("alice".to_string());

        let outcome = pick_assignee(false, &candidates, &HashMap::new(), &holders, today);
        assert_eq!(outcome, AssignOutcome::Assigned("alice".to_string()));
    }
}
