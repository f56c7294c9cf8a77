//! Points ledger entries and running balances
//!
//! The ledger is append-only: undo writes a mirroring entry, it never
//! erases the original.

use chorestore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;
use crate::points::Points;

/// Why a ledger entry exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Credit from an ordinary completion
    ChoreCompleted,
    /// Credit from an approved arcade run
    ArcadeCompleted,
    /// Reversal of an undone completion
    Undo,
}

impl std::fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChoreCompleted => write!(f, "chore_completed"),
            Self::ArcadeCompleted => write!(f, "arcade_completed"),
            Self::Undo => write!(f, "undo"),
        }
    }
}

/// One signed movement of points for one person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier
    pub id: String,

    pub person_id: String,

    /// Signed point delta
    pub delta: Points,

    /// All-time balance after applying the delta
    pub balance_after: Points,

    /// Completion this entry settles, when applicable
    pub completion_id: Option<String>,

    pub reason: LedgerReason,

    /// Who caused the entry (completer, judge, undoing admin)
    pub actor: String,

    pub created_at: i64,
}

impl LedgerEntry {
    pub fn new(
        person_id: impl Into<String>,
        delta: Points,
        balance_after: Points,
        completion_id: Option<String>,
        reason: LedgerReason,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id("ledger", "entry"),
            person_id: person_id.into(),
            delta,
            balance_after,
            completion_id,
            reason,
            actor: actor.into(),
            created_at: now_ms(),
        }
    }
}

impl Record for LedgerEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "ledger"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("person".to_string(), IndexValue::String(self.person_id.clone()));
        fields.insert("reason".to_string(), IndexValue::String(self.reason.to_string()));
        if let Some(completion) = &self.completion_id {
            fields.insert("completion".to_string(), IndexValue::String(completion.clone()));
        }
        fields
    }
}

/// Running balances for one person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    /// Person id doubles as the record id
    pub id: String,

    /// Resettable weekly counter
    pub weekly: Points,

    /// Cumulative all-time counter
    pub all_time: Points,

    pub updated_at: i64,
}

impl Balance {
    pub fn new(person_id: impl Into<String>) -> Self {
        Self {
            id: person_id.into(),
            weekly: Points::ZERO,
            all_time: Points::ZERO,
            updated_at: now_ms(),
        }
    }

    /// Apply a signed delta to both counters
    pub fn apply(&mut self, delta: Points) {
        self.weekly += delta;
        self.all_time += delta;
        self.updated_at = now_ms();
    }

    /// Weekly reset; the all-time counter is untouched
    pub fn reset_weekly(&mut self) {
        self.weekly = Points::ZERO;
        self.updated_at = now_ms();
    }
}

impl Record for Balance {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "balances"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}
