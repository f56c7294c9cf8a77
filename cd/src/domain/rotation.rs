//! Rotation state - per (template, person) last-completed dates
//!
//! Drives assignment fairness: yesterday's completer sits out today, and
//! the candidate with the oldest (or absent) date wins.

use chorestore::{IndexValue, Record, now_ms};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Last completion date of one template by one person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationState {
    /// Composite id: `rot:{template_id}:{person_id}`
    pub id: String,

    pub template_id: String,
    pub person_id: String,

    /// Local date of the most recent completion
    pub last_completed_on: NaiveDate,

    pub updated_at: i64,
}

impl RotationState {
    /// The deterministic record id for a (template, person) pair
    pub fn key(template_id: &str, person_id: &str) -> String {
        format!("rot:{}:{}", template_id, person_id)
    }

    pub fn new(template_id: impl Into<String>, person_id: impl Into<String>, date: NaiveDate) -> Self {
        let template_id = template_id.into();
        let person_id = person_id.into();
        Self {
            id: Self::key(&template_id, &person_id),
            template_id,
            person_id,
            last_completed_on: date,
            updated_at: now_ms(),
        }
    }

    pub fn advance_to(&mut self, date: NaiveDate) {
        // Backdated completions must not move the date backwards
        if date > self.last_completed_on {
            self.last_completed_on = date;
        }
        self.updated_at = now_ms();
    }
}

impl Record for RotationState {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "rotation"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("template".to_string(), IndexValue::String(self.template_id.clone()));
        fields.insert("person".to_string(), IndexValue::String(self.person_id.clone()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_key_is_deterministic() {
        assert_eq!(RotationState::key("t1", "alice"), "rot:t1:alice");
        let state = RotationState::new("t1", "alice", date(2026, 3, 1));
        assert_eq!(state.id, "rot:t1:alice");
    }

    #[test]
    fn test_advance_never_goes_backwards() {
        let mut state = RotationState::new("t1", "alice", date(2026, 3, 5));
        state.advance_to(date(2026, 3, 2));
        assert_eq!(state.last_completed_on, date(2026, 3, 5));
        state.advance_to(date(2026, 3, 7));
        assert_eq!(state.last_completed_on, date(2026, 3, 7));
    }
}
