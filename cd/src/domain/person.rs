//! Household members and the person-directory seam
//!
//! The directory is an external collaborator: the core only reads it.
//! Claim counters are core state and live in their own record.

use async_trait::async_trait;
use chorestore::{Filter, IndexValue, Record, Store, now_ms};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};

/// A household member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// May hold chore assignments
    pub assignable: bool,

    /// Currently part of the household
    pub active: bool,

    /// Earns points for completions
    pub points_eligible: bool,

    /// Skipped by automatic assignment (may still claim)
    pub auto_assign_exempt: bool,

    /// May undo completions and run manual sweeps
    pub admin: bool,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Person {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            name: name.into(),
            assignable: true,
            active: true,
            points_eligible: true,
            auto_assign_exempt: false,
            admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_points_eligible(mut self, eligible: bool) -> Self {
        self.points_eligible = eligible;
        self
    }

    pub fn with_assignable(mut self, assignable: bool) -> Self {
        self.assignable = assignable;
        self
    }

    pub fn with_auto_assign_exempt(mut self, exempt: bool) -> Self {
        self.auto_assign_exempt = exempt;
        self
    }

    /// Can receive work at all
    pub fn is_capable(&self) -> bool {
        self.active && self.assignable
    }

    /// Can receive automatic assignments
    pub fn is_auto_assignable(&self) -> bool {
        self.is_capable() && !self.auto_assign_exempt
    }
}

impl Record for Person {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "persons"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("active".to_string(), IndexValue::Bool(self.active));
        fields.insert("assignable".to_string(), IndexValue::Bool(self.assignable));
        fields
    }
}

/// Read-only view of the household's members
#[async_trait]
pub trait PersonDirectory: Send + Sync {
    /// Look up one person
    async fn get(&self, id: &str) -> CoreResult<Option<Person>>;

    /// All active, assignable persons
    async fn capable(&self) -> CoreResult<Vec<Person>>;

    /// Look up one person, erroring when absent
    async fn get_required(&self, id: &str) -> CoreResult<Person> {
        self.get(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("Person {}", id)))
    }
}

/// Store-backed directory implementation
pub struct StoreDirectory {
    store: Arc<Store>,
}

impl StoreDirectory {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PersonDirectory for StoreDirectory {
    async fn get(&self, id: &str) -> CoreResult<Option<Person>> {
        self.store.get(id).map_err(CoreError::storage)
    }

    async fn capable(&self) -> CoreResult<Vec<Person>> {
        let persons: Vec<Person> = self
            .store
            .list(&[Filter::eq("active", true), Filter::eq("assignable", true)])
            .map_err(CoreError::storage)?;
        Ok(persons)
    }
}

/// Per-person daily claim counter; reset by the daily sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimCounter {
    /// Person id doubles as the record id (one counter per person)
    pub id: String,

    /// Local date the count belongs to
    pub date: NaiveDate,

    /// Claims made on `date`
    pub count: u32,

    pub updated_at: i64,
}

impl ClaimCounter {
    pub fn new(person_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: person_id.into(),
            date,
            count: 0,
            updated_at: now_ms(),
        }
    }

    /// Count for the given date; a stale counter reads as zero
    pub fn count_on(&self, date: NaiveDate) -> u32 {
        if self.date == date { self.count } else { 0 }
    }

    /// Record one claim on the given date, rolling the date forward if stale
    pub fn increment_on(&mut self, date: NaiveDate) {
        if self.date != date {
            self.date = date;
            self.count = 0;
        }
        self.count += 1;
        self.updated_at = now_ms();
    }

    /// Zero the counter for a new day
    pub fn reset_to(&mut self, date: NaiveDate) {
        self.date = date;
        self.count = 0;
        self.updated_at = now_ms();
    }
}

impl Record for ClaimCounter {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "claim_counters"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_capability() {
        let person = Person::new("alice", "Alice");
        assert!(person.is_capable());
        assert!(person.is_auto_assignable());

        let exempt = Person::new("bob", "Bob").with_auto_assign_exempt(true);
        assert!(exempt.is_capable());
        assert!(!exempt.is_auto_assignable());

        let inactive = Person {
            active: false,
            ..Person::new("carol", "Carol")
        };
        assert!(!inactive.is_capable());
    }

    #[test]
    fn test_claim_counter_stale_date_reads_zero() {
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let mut counter = ClaimCounter::new("alice", d1);
        counter.increment_on(d1);
        counter.increment_on(d1);
        assert_eq!(counter.count_on(d1), 2);
        assert_eq!(counter.count_on(d2), 0);

        // Rolling forward resets the count
        counter.increment_on(d2);
        assert_eq!(counter.count_on(d2), 1);
    }

    #[tokio::test]
    async fn test_store_directory() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(temp.path()).unwrap());

        store.create(Person::new("alice", "Alice")).unwrap();
        store.create(Person::new("bob", "Bob").with_assignable(false)).unwrap();

        let directory = StoreDirectory::new(store);
        let capable = directory.capable().await.unwrap();
        assert_eq!(capable.len(), 1);
        assert_eq!(capable[0].id, "alice");

        assert!(directory.get("bob").await.unwrap().is_some());
        assert!(directory.get_required("ghost").await.is_err());
    }
}
