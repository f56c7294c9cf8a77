//! Chore occurrences - dated instances of a template

use chorestore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;
use super::template::ChoreTemplate;
use crate::points::Points;

/// Lifecycle state of an occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    /// Unassigned; any eligible person may claim it
    #[default]
    Pool,
    /// Held by one person
    Assigned,
    /// Done; terminal unless undone
    Completed,
    /// Waived without points; terminal
    Skipped,
}

impl OccurrenceStatus {
    /// Open occurrences block the sweep from creating another
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pool | Self::Assigned)
    }
}

impl std::fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pool => write!(f, "pool"),
            Self::Assigned => write!(f, "assigned"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why an occurrence holds its current assignment (or lack of one)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentReason {
    /// A person claimed it themselves
    Claimed,
    /// The rotation service picked the assignee
    Auto,
    /// Spawned onto the parent occurrence's completer
    ParentCompletion,
    /// Assignment failed: the candidate set is structurally empty
    NoneEligible,
    /// Assignment failed: every candidate completed it yesterday
    AllCompletedYesterday,
    /// Assignment failed: remaining candidates hit the difficult-chore cap
    DifficultLimit,
}

impl std::fmt::Display for AssignmentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claimed => write!(f, "claimed"),
            Self::Auto => write!(f, "auto"),
            Self::ParentCompletion => write!(f, "parent_completion"),
            Self::NoneEligible => write!(f, "none_eligible"),
            Self::AllCompletedYesterday => write!(f, "all_completed_yesterday"),
            Self::DifficultLimit => write!(f, "difficult_limit"),
        }
    }
}

/// One dated instance of a chore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    /// Unique identifier
    pub id: String,

    /// Owning template
    pub template_id: String,

    /// Point value snapshot taken at creation; template edits don't touch it
    pub points: Points,

    /// Lifecycle state
    pub status: OccurrenceStatus,

    /// Current holder, when Assigned or Completed
    pub assignee: Option<String>,

    /// How the current assignment (or block) came about
    pub assignment_reason: Option<AssignmentReason>,

    /// When the assignment happened (Unix milliseconds)
    pub assigned_at: Option<i64>,

    /// Due timestamp (Unix milliseconds); far-future sentinel when unset
    pub due_at: i64,

    /// When the pool occurrence becomes auto-assignable
    pub distribute_at: i64,

    /// Set once when the due time passes while still open
    pub overdue: bool,

    /// Completion timestamp
    pub completed_at: Option<i64>,

    /// Completed after the due time
    pub late: bool,

    /// Skip metadata
    pub skipped_by: Option<String>,
    pub skipped_at: Option<i64>,
    pub skip_note: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Occurrence {
    /// Stamp a new pool occurrence from a template
    pub fn from_template(template: &ChoreTemplate, due_at: i64, distribute_at: i64) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("occ", &template.name),
            template_id: template.id.clone(),
            points: template.points,
            status: OccurrenceStatus::Pool,
            assignee: None,
            assignment_reason: None,
            assigned_at: None,
            due_at,
            distribute_at,
            overdue: false,
            completed_at: None,
            late: false,
            skipped_by: None,
            skipped_at: None,
            skip_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Move to Assigned with the given reason
    pub fn assign(&mut self, person: impl Into<String>, reason: AssignmentReason, at_ms: i64) {
        self.status = OccurrenceStatus::Assigned;
        self.assignee = Some(person.into());
        self.assignment_reason = Some(reason);
        self.assigned_at = Some(at_ms);
        self.updated_at = now_ms();
    }

    /// Record why auto-assignment is blocked; status stays Pool
    pub fn mark_blocked(&mut self, reason: AssignmentReason) {
        self.assignment_reason = Some(reason);
        self.updated_at = now_ms();
    }

    /// Move to Completed
    pub fn complete(&mut self, completer: impl Into<String>, at_ms: i64, late: bool) {
        self.status = OccurrenceStatus::Completed;
        self.assignee = Some(completer.into());
        self.completed_at = Some(at_ms);
        self.late = late;
        self.updated_at = now_ms();
    }

    /// Return to the pool (arcade cancel, undo of a pool chore)
    pub fn release_to_pool(&mut self) {
        self.status = OccurrenceStatus::Pool;
        self.assignee = None;
        self.assignment_reason = None;
        self.assigned_at = None;
        self.completed_at = None;
        self.late = false;
        self.updated_at = now_ms();
    }

    /// Restore to Assigned after an undo of a non-pool chore
    pub fn restore_assigned(&mut self, person: impl Into<String>) {
        self.status = OccurrenceStatus::Assigned;
        self.assignee = Some(person.into());
        self.completed_at = None;
        self.late = false;
        self.updated_at = now_ms();
    }

    /// Move to Skipped with metadata
    pub fn skip(&mut self, actor: impl Into<String>, at_ms: i64, note: Option<String>) {
        self.status = OccurrenceStatus::Skipped;
        self.skipped_by = Some(actor.into());
        self.skipped_at = Some(at_ms);
        self.skip_note = note;
        self.updated_at = now_ms();
    }

    pub fn mark_overdue(&mut self) {
        self.overdue = true;
        self.updated_at = now_ms();
    }
}

impl Record for Occurrence {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "occurrences"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("template".to_string(), IndexValue::String(self.template_id.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("open".to_string(), IndexValue::Bool(self.is_open()));
        if let Some(assignee) = &self.assignee {
            fields.insert("assignee".to_string(), IndexValue::String(assignee.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::template::ScheduleSpec;

    fn template() -> ChoreTemplate {
        ChoreTemplate::new("Dishes", Points::from_whole(5), ScheduleSpec::Daily)
    }

    #[test]
    fn test_from_template_snapshots_points() {
        let mut t = template();
        let occ = Occurrence::from_template(&t, 1000, 500);
        t.points = Points::from_whole(99);
        assert_eq!(occ.points, Points::from_whole(5));
        assert_eq!(occ.status, OccurrenceStatus::Pool);
        assert!(occ.is_open());
    }

    #[test]
    fn test_assign_and_complete() {
        let t = template();
        let mut occ = Occurrence::from_template(&t, 1000, 500);

        occ.assign("alice", AssignmentReason::Auto, 600);
        assert_eq!(occ.status, OccurrenceStatus::Assigned);
        assert_eq!(occ.assignee.as_deref(), Some("alice"));
        assert!(occ.is_open());

        occ.complete("alice", 900, false);
        assert_eq!(occ.status, OccurrenceStatus::Completed);
        assert!(!occ.is_open());
        assert_eq!(occ.completed_at, Some(900));
    }

    #[test]
    fn test_release_to_pool_clears_assignment() {
        let t = template();
        let mut occ = Occurrence::from_template(&t, 1000, 500);
        occ.assign("bob", AssignmentReason::Claimed, 600);
        occ.release_to_pool();
        assert_eq!(occ.status, OccurrenceStatus::Pool);
        assert!(occ.assignee.is_none());
        assert!(occ.assignment_reason.is_none());
    }

    #[test]
    fn test_blocked_stays_pool() {
        let t = template();
        let mut occ = Occurrence::from_template(&t, 1000, 500);
        occ.mark_blocked(AssignmentReason::AllCompletedYesterday);
        assert_eq!(occ.status, OccurrenceStatus::Pool);
        assert_eq!(occ.assignment_reason, Some(AssignmentReason::AllCompletedYesterday));
    }

    #[test]
    fn test_skip_records_metadata() {
        let t = template();
        let mut occ = Occurrence::from_template(&t, 1000, 500);
        occ.skip("admin", 700, Some("on holiday".to_string()));
        assert_eq!(occ.status, OccurrenceStatus::Skipped);
        assert_eq!(occ.skipped_by.as_deref(), Some("admin"));
        assert!(!occ.is_open());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(OccurrenceStatus::Pool.to_string(), "pool");
        assert_eq!(OccurrenceStatus::Assigned.to_string(), "assigned");
        assert_eq!(OccurrenceStatus::Completed.to_string(), "completed");
        assert_eq!(OccurrenceStatus::Skipped.to_string(), "skipped");
    }
}
