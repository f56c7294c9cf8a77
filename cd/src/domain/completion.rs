//! Completions and credit shares
//!
//! Exactly one active (non-undone) completion may exist per occurrence.
//! Undo flags a completion; it never deletes it or its shares.

use chorestore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;
use crate::points::Points;

/// A successful completion of one occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Unique identifier
    pub id: String,

    pub occurrence_id: String,
    pub template_id: String,

    /// Who completed it
    pub completed_by: String,

    /// Completion timestamp (may be backdated)
    pub completed_at: i64,

    /// Completed after the due time
    pub late: bool,

    /// Settled through the arcade path
    pub arcade: bool,

    /// Undo audit trail
    pub undone: bool,
    pub undone_by: Option<String>,
    pub undone_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Completion {
    pub fn new(
        occurrence_id: impl Into<String>,
        template_id: impl Into<String>,
        completed_by: impl Into<String>,
        completed_at: i64,
        late: bool,
    ) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("done", "completion"),
            occurrence_id: occurrence_id.into(),
            template_id: template_id.into(),
            completed_by: completed_by.into(),
            completed_at,
            late,
            arcade: false,
            undone: false,
            undone_by: None,
            undone_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_arcade(mut self, arcade: bool) -> Self {
        self.arcade = arcade;
        self
    }

    /// Flag as undone, preserving the record
    pub fn mark_undone(&mut self, actor: impl Into<String>, at_ms: i64) {
        self.undone = true;
        self.undone_by = Some(actor.into());
        self.undone_at = Some(at_ms);
        self.updated_at = now_ms();
    }

    /// Reactivate an undone completion for arcade settlement reuse
    pub fn reuse_for_arcade(&mut self, completed_by: impl Into<String>, completed_at: i64, late: bool) {
        self.completed_by = completed_by.into();
        self.completed_at = completed_at;
        self.late = late;
        self.arcade = true;
        self.undone = false;
        self.undone_by = None;
        self.undone_at = None;
        self.updated_at = now_ms();
    }
}

impl Record for Completion {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "completions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("occurrence".to_string(), IndexValue::String(self.occurrence_id.clone()));
        fields.insert("template".to_string(), IndexValue::String(self.template_id.clone()));
        fields.insert("undone".to_string(), IndexValue::Bool(self.undone));
        fields
    }
}

/// One person's slice of a completion's points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionShare {
    /// Unique identifier
    pub id: String,

    pub completion_id: String,
    pub person_id: String,

    /// Points awarded to this person
    pub points: Points,

    pub created_at: i64,
}

impl CompletionShare {
    pub fn new(completion_id: impl Into<String>, person_id: impl Into<String>, points: Points) -> Self {
        Self {
            id: generate_id("share", "share"),
            completion_id: completion_id.into(),
            person_id: person_id.into(),
            points,
            created_at: now_ms(),
        }
    }
}

impl Record for CompletionShare {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "completion_shares"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("completion".to_string(), IndexValue::String(self.completion_id.clone()));
        fields.insert("person".to_string(), IndexValue::String(self.person_id.clone()));
        fields
    }
}
