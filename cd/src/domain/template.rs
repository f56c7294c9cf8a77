//! Chore templates and schedule descriptors

use chrono::NaiveDate;
use chorestore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;
use crate::points::Points;

/// When a template produces occurrences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleSpec {
    /// Due every local day
    Daily,
    /// Due on one weekday; 0 = Monday .. 6 = Sunday
    Weekly { weekday: u8 },
    /// Due every n days counted from an anchor date
    EveryNDays { n: u32, anchor: NaiveDate },
    /// Cron-like rule: "dom mon dow" with `*`, lists and ranges
    Rule { expr: String },
    /// Due exactly once, at template creation; never via the sweep
    Once { due_on: Option<NaiveDate> },
}

impl ScheduleSpec {
    pub fn is_once(&self) -> bool {
        matches!(self, Self::Once { .. })
    }
}

/// A dependency edge: this template spawns when `parent_id` completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub parent_id: String,
    /// Hours between the parent's completion and the child's due time
    pub offset_hours: u32,
}

/// A chore template - the recurring definition occurrences are stamped from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreTemplate {
    /// Unique identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Point value copied onto each occurrence at creation
    pub points: Points,

    /// Pool chores sit unassigned until claimed or auto-assigned
    pub pool: bool,

    /// Undesirable chores rotate through the eligibility list
    pub undesirable: bool,

    /// Difficult chores are capped at one per person per day
    pub difficult: bool,

    /// Recurrence descriptor
    pub schedule: ScheduleSpec,

    /// Distribution time as minutes after local midnight
    pub distribute_minutes: u32,

    /// Inactive templates are skipped by the sweep
    pub active: bool,

    /// One-shot reschedule override; cleared once consumed
    pub reschedule_to: Option<NaiveDate>,

    /// Templates this one spawns from (non-empty means dependency child)
    pub depends_on: Vec<DependencyEdge>,

    /// Candidate pool for undesirable chores; empty means open to all
    pub eligible: Vec<String>,

    /// Set when the archival pass retires the template
    pub archived_at: Option<i64>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl ChoreTemplate {
    /// Create a new template with generated ID
    pub fn new(name: impl Into<String>, points: Points, schedule: ScheduleSpec) -> Self {
        let name = name.into();
        let now = now_ms();
        Self {
            id: generate_id("chore", &name),
            name,
            points,
            pool: false,
            undesirable: false,
            difficult: false,
            schedule,
            distribute_minutes: 9 * 60,
            active: true,
            reschedule_to: None,
            depends_on: Vec::new(),
            eligible: Vec::new(),
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a template with a specific ID (for testing or recovery)
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, points: Points, schedule: ScheduleSpec) -> Self {
        let mut template = Self::new(name, points, schedule);
        template.id = id.into();
        template
    }

    pub fn with_pool(mut self, pool: bool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_undesirable(mut self, undesirable: bool) -> Self {
        self.undesirable = undesirable;
        self
    }

    pub fn with_difficult(mut self, difficult: bool) -> Self {
        self.difficult = difficult;
        self
    }

    pub fn with_distribute_minutes(mut self, minutes: u32) -> Self {
        self.distribute_minutes = minutes;
        self
    }

    pub fn with_eligible(mut self, persons: Vec<String>) -> Self {
        self.eligible = persons;
        self
    }

    pub fn with_dependency(mut self, parent_id: impl Into<String>, offset_hours: u32) -> Self {
        self.depends_on.push(DependencyEdge {
            parent_id: parent_id.into(),
            offset_hours,
        });
        self
    }

    /// The cross-cutting "child chores never self-schedule" predicate
    pub fn is_dependency_child(&self) -> bool {
        !self.depends_on.is_empty()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Consume the reschedule override
    pub fn clear_reschedule(&mut self) {
        self.reschedule_to = None;
        self.updated_at = now_ms();
    }

    pub fn set_reschedule(&mut self, date: NaiveDate) {
        self.reschedule_to = Some(date);
        self.updated_at = now_ms();
    }

    pub fn archive(&mut self) {
        self.archived_at = Some(now_ms());
        self.active = false;
        self.updated_at = now_ms();
    }

    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

impl Record for ChoreTemplate {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "templates"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("active".to_string(), IndexValue::Bool(self.active));
        fields.insert("pool".to_string(), IndexValue::Bool(self.pool));
        fields.insert("undesirable".to_string(), IndexValue::Bool(self.undesirable));
        fields.insert("difficult".to_string(), IndexValue::Bool(self.difficult));
        fields.insert("child".to_string(), IndexValue::Bool(self.is_dependency_child()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_template_defaults() {
        let template = ChoreTemplate::new("Dishes", Points::from_whole(5), ScheduleSpec::Daily);
        assert!(template.id.contains("-chore-dishes"));
        assert!(template.active);
        assert!(!template.pool);
        assert!(!template.is_dependency_child());
        assert!(!template.is_archived());
    }

    #[test]
    fn test_dependency_child_predicate() {
        let template = ChoreTemplate::new("Dry Dishes", Points::from_whole(2), ScheduleSpec::Daily)
            .with_dependency("parent-id", 2);
        assert!(template.is_dependency_child());
        assert_eq!(template.depends_on[0].offset_hours, 2);
    }

    #[test]
    fn test_reschedule_consumed() {
        let mut template = ChoreTemplate::new("Bins", Points::from_whole(3), ScheduleSpec::Daily);
        let date = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        template.set_reschedule(date);
        assert_eq!(template.reschedule_to, Some(date));
        template.clear_reschedule();
        assert!(template.reschedule_to.is_none());
    }

    #[test]
    fn test_archive() {
        let mut template = ChoreTemplate::new("Fix Gate", Points::from_whole(10), ScheduleSpec::Once { due_on: None });
        template.archive();
        assert!(template.is_archived());
        assert!(!template.active);
    }

    #[test]
    fn test_schedule_serde_roundtrip() {
        let specs = vec![
            ScheduleSpec::Daily,
            ScheduleSpec::Weekly { weekday: 2 },
            ScheduleSpec::EveryNDays {
                n: 3,
                anchor: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            },
            ScheduleSpec::Rule {
                expr: "1,15 * *".to_string(),
            },
            ScheduleSpec::Once {
                due_on: Some(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()),
            },
        ];
        for spec in specs {
            let json = serde_json::to_string(&spec).unwrap();
            let parsed: ScheduleSpec = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, spec);
        }
    }

    #[test]
    fn test_indexed_fields() {
        let template = ChoreTemplate::new("Vacuum", Points::from_whole(4), ScheduleSpec::Daily)
            .with_pool(true)
            .with_undesirable(true);
        let fields = template.indexed_fields();
        assert_eq!(fields.get("pool"), Some(&IndexValue::Bool(true)));
        assert_eq!(fields.get("undesirable"), Some(&IndexValue::Bool(true)));
        assert_eq!(fields.get("child"), Some(&IndexValue::Bool(false)));
    }
}
