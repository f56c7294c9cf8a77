//! Sweep run records for operators and the midnight watchdog

use chorestore::{IndexValue, Record, now_ms};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;

/// Which sweep ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    Daily,
    Frequent,
}

impl std::fmt::Display for SweepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Frequent => write!(f, "frequent"),
        }
    }
}

/// Outcome counts of one sweep run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Occurrences created
    pub created: u32,
    /// Occurrences newly marked overdue
    pub overdue_marked: u32,
    /// One-off templates archived
    pub archived: u32,
    /// Pool occurrences auto-assigned
    pub assigned: u32,
    /// Assignment attempts that returned a blocked outcome
    pub blocked: u32,
    /// Per-template failures (isolated, never fatal to the sweep)
    pub failures: u32,
}

impl SweepReport {
    pub fn merge(&mut self, other: &SweepReport) {
        self.created += other.created;
        self.overdue_marked += other.overdue_marked;
        self.archived += other.archived;
        self.assigned += other.assigned;
        self.blocked += other.blocked;
        self.failures += other.failures;
    }
}

/// Persistent record of one sweep run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepLog {
    /// Unique identifier
    pub id: String,

    pub kind: SweepKind,

    /// Local date the sweep ran for
    pub local_date: NaiveDate,

    pub started_at: i64,
    pub finished_at: i64,

    /// A sweep with isolated per-template failures still succeeds overall;
    /// false means the run itself aborted
    pub success: bool,

    pub report: SweepReport,

    pub created_at: i64,
}

impl SweepLog {
    pub fn new(kind: SweepKind, local_date: NaiveDate, started_at: i64, finished_at: i64, success: bool, report: SweepReport) -> Self {
        Self {
            id: generate_id("sweep", "run"),
            kind,
            local_date,
            started_at,
            finished_at,
            success,
            report,
            created_at: now_ms(),
        }
    }
}

impl Record for SweepLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "sweep_logs"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("kind".to_string(), IndexValue::String(self.kind.to_string()));
        fields.insert("date".to_string(), IndexValue::String(self.local_date.to_string()));
        fields.insert("success".to_string(), IndexValue::Bool(self.success));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_merge() {
        let mut a = SweepReport {
            created: 2,
            failures: 1,
            ..Default::default()
        };
        let b = SweepReport {
            created: 1,
            assigned: 3,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.created, 3);
        assert_eq!(a.assigned, 3);
        assert_eq!(a.failures, 1);
    }

    #[test]
    fn test_sweep_log_indexed_by_kind_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let log = SweepLog::new(SweepKind::Daily, date, 0, 10, true, SweepReport::default());
        let fields = log.indexed_fields();
        assert_eq!(fields.get("kind"), Some(&IndexValue::String("daily".to_string())));
        assert_eq!(fields.get("date"), Some(&IndexValue::String("2026-03-01".to_string())));
        assert_eq!(fields.get("success"), Some(&IndexValue::Bool(true)));
    }
}
