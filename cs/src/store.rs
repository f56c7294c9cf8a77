//! SQLite-backed store implementation
//!
//! Records are stored as JSON rows keyed by (collection, id); a separate
//! index table holds the encoded values of each record's indexed fields.
//! The store directory is guarded by an exclusive file lock so two
//! processes cannot open the same store concurrently.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::record::{Filter, FilterOp, Record};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    data       TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE TABLE IF NOT EXISTS record_index (
    collection TEXT NOT NULL,
    field      TEXT NOT NULL,
    id         TEXT NOT NULL,
    value      TEXT NOT NULL,
    PRIMARY KEY (collection, field, id)
);
CREATE INDEX IF NOT EXISTS idx_record_index_lookup
    ON record_index (collection, field, value);
";

/// The record store
///
/// Cheap operations behind a connection mutex; callers needing multi-step
/// atomicity coordinate above this layer.
pub struct Store {
    conn: Mutex<Connection>,
    /// Held for the store's lifetime; exclusively locks the store directory
    _lock: File,
}

impl Store {
    /// Open (or create) a store at the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create store directory")?;

        let lock_path = dir.join("store.lock");
        let lock = File::create(&lock_path).context("Failed to create store lock file")?;
        lock.try_lock_exclusive()
            .map_err(|e| eyre!("Store at {} is locked by another process: {}", dir.display(), e))?;

        let db_path = dir.join("store.db");
        let conn = Connection::open(&db_path).context("Failed to open store database")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize store schema")?;

        info!(path = %db_path.display(), "Store opened");

        Ok(Self {
            conn: Mutex::new(conn),
            _lock: lock,
        })
    }

    /// Create a new record; fails if the id already exists in the collection
    pub fn create<T: Record>(&self, record: T) -> Result<String> {
        let collection = T::collection_name();
        let id = record.id().to_string();
        let data = serde_json::to_string(&record).context("Failed to serialize record")?;

        let conn = self.conn.lock().expect("store mutex poisoned");

        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(eyre!("Record {} already exists in {}", id, collection));
        }

        conn.execute(
            "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![collection, id, data, record.updated_at()],
        )?;
        Self::write_index(&conn, collection, &record)?;

        debug!(%collection, %id, "Record created");
        Ok(id)
    }

    /// Get a record by id
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        let collection = T::collection_name();
        let conn = self.conn.lock().expect("store mutex poisoned");

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => {
                let record = serde_json::from_str(&json).context("Failed to deserialize record")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Update an existing record; fails if it does not exist
    pub fn update<T: Record>(&self, record: T) -> Result<()> {
        let collection = T::collection_name();
        let id = record.id().to_string();
        let data = serde_json::to_string(&record).context("Failed to serialize record")?;

        let conn = self.conn.lock().expect("store mutex poisoned");

        let changed = conn.execute(
            "UPDATE records SET data = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
            params![collection, id, data, record.updated_at()],
        )?;
        if changed == 0 {
            return Err(eyre!("Record {} not found in {}", id, collection));
        }

        conn.execute(
            "DELETE FROM record_index WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Self::write_index(&conn, collection, &record)?;

        debug!(%collection, %id, "Record updated");
        Ok(())
    }

    /// Delete a record by id
    pub fn delete<T: Record>(&self, id: &str) -> Result<()> {
        let collection = T::collection_name();
        let conn = self.conn.lock().expect("store mutex poisoned");

        conn.execute(
            "DELETE FROM record_index WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        let changed = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        if changed == 0 {
            return Err(eyre!("Record {} not found in {}", id, collection));
        }

        debug!(%collection, %id, "Record deleted");
        Ok(())
    }

    /// List records matching all of the given filters
    ///
    /// With no filters, lists the whole collection.
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        let collection = T::collection_name();
        let conn = self.conn.lock().expect("store mutex poisoned");

        let mut ids: Option<Vec<String>> = None;
        for filter in filters {
            let matching = Self::index_lookup(&conn, collection, &filter.field, &filter.value.encode())?;
            let next: Vec<String> = match (&ids, filter.op) {
                (None, FilterOp::Eq) => matching,
                (None, FilterOp::Ne) => {
                    let all = Self::all_ids(&conn, collection)?;
                    all.into_iter().filter(|id| !matching.contains(id)).collect()
                }
                (Some(current), FilterOp::Eq) => {
                    current.iter().filter(|id| matching.contains(id)).cloned().collect()
                }
                (Some(current), FilterOp::Ne) => {
                    current.iter().filter(|id| !matching.contains(id)).cloned().collect()
                }
            };
            ids = Some(next);
        }

        let ids = match ids {
            Some(ids) => ids,
            None => Self::all_ids(&conn, collection)?,
        };

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(json) = data {
                records.push(serde_json::from_str(&json).context("Failed to deserialize record")?);
            }
        }
        Ok(records)
    }

    /// Rebuild the index rows for every record in a collection
    ///
    /// Returns the number of records indexed. Needed after a record type's
    /// indexed fields change between versions.
    pub fn rebuild_indexes<T: Record>(&self) -> Result<usize> {
        let collection = T::collection_name();
        let conn = self.conn.lock().expect("store mutex poisoned");

        conn.execute("DELETE FROM record_index WHERE collection = ?1", params![collection])?;

        let mut stmt = conn.prepare("SELECT data FROM records WHERE collection = ?1")?;
        let rows: Vec<String> = stmt
            .query_map(params![collection], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut count = 0;
        for json in rows {
            let record: T = serde_json::from_str(&json).context("Failed to deserialize record")?;
            Self::write_index(&conn, collection, &record)?;
            count += 1;
        }

        debug!(%collection, count, "Indexes rebuilt");
        Ok(count)
    }

    /// Count records in a collection
    pub fn count<T: Record>(&self) -> Result<usize> {
        let collection = T::collection_name();
        let conn = self.conn.lock().expect("store mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn write_index<T: Record>(conn: &Connection, collection: &str, record: &T) -> Result<()> {
        for (field, value) in record.indexed_fields() {
            conn.execute(
                "INSERT OR REPLACE INTO record_index (collection, field, id, value) VALUES (?1, ?2, ?3, ?4)",
                params![collection, field, record.id(), value.encode()],
            )?;
        }
        Ok(())
    }

    fn index_lookup(conn: &Connection, collection: &str, field: &str, value: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT id FROM record_index WHERE collection = ?1 AND field = ?2 AND value = ?3",
        )?;
        let ids = stmt
            .query_map(params![collection, field, value], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn all_ids(conn: &Connection, collection: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT id FROM records WHERE collection = ?1")?;
        let ids = stmt
            .query_map(params![collection], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::now_ms;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Widget {
        id: String,
        color: String,
        heavy: bool,
        updated_at: i64,
    }

    impl Widget {
        fn new(id: &str, color: &str, heavy: bool) -> Self {
            Self {
                id: id.to_string(),
                color: color.to_string(),
                heavy,
                updated_at: now_ms(),
            }
        }
    }

    impl Record for Widget {
        fn id(&self) -> &str {
            &self.id
        }

        fn updated_at(&self) -> i64 {
            self.updated_at
        }

        fn collection_name() -> &'static str {
            "widgets"
        }

        fn indexed_fields(&self) -> HashMap<String, crate::IndexValue> {
            let mut fields = HashMap::new();
            fields.insert("color".to_string(), crate::IndexValue::String(self.color.clone()));
            fields.insert("heavy".to_string(), crate::IndexValue::Bool(self.heavy));
            fields
        }
    }

    #[test]
    fn test_create_get_roundtrip() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let widget = Widget::new("w-1", "red", false);
        let id = store.create(widget.clone()).unwrap();
        assert_eq!(id, "w-1");

        let loaded: Widget = store.get("w-1").unwrap().unwrap();
        assert_eq!(loaded, widget);
    }

    #[test]
    fn test_create_duplicate_fails() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.create(Widget::new("w-1", "red", false)).unwrap();
        assert!(store.create(Widget::new("w-1", "blue", false)).is_err());
    }

    #[test]
    fn test_get_missing_returns_none() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        let loaded: Option<Widget> = store.get("nope").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_update_changes_record_and_index() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.create(Widget::new("w-1", "red", false)).unwrap();

        let mut widget: Widget = store.get("w-1").unwrap().unwrap();
        widget.color = "blue".to_string();
        store.update(widget).unwrap();

        let reds: Vec<Widget> = store.list(&[Filter::eq("color", "red")]).unwrap();
        assert!(reds.is_empty());
        let blues: Vec<Widget> = store.list(&[Filter::eq("color", "blue")]).unwrap();
        assert_eq!(blues.len(), 1);
    }

    #[test]
    fn test_update_missing_fails() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        assert!(store.update(Widget::new("ghost", "red", false)).is_err());
    }

    #[test]
    fn test_delete() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.create(Widget::new("w-1", "red", false)).unwrap();
        store.delete::<Widget>("w-1").unwrap();

        let loaded: Option<Widget> = store.get("w-1").unwrap();
        assert!(loaded.is_none());
        assert!(store.delete::<Widget>("w-1").is_err());
    }

    #[test]
    fn test_list_with_filters() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.create(Widget::new("w-1", "red", true)).unwrap();
        store.create(Widget::new("w-2", "red", false)).unwrap();
        store.create(Widget::new("w-3", "blue", true)).unwrap();

        let all: Vec<Widget> = store.list(&[]).unwrap();
        assert_eq!(all.len(), 3);

        let reds: Vec<Widget> = store.list(&[Filter::eq("color", "red")]).unwrap();
        assert_eq!(reds.len(), 2);

        let heavy_reds: Vec<Widget> = store
            .list(&[Filter::eq("color", "red"), Filter::eq("heavy", true)])
            .unwrap();
        assert_eq!(heavy_reds.len(), 1);
        assert_eq!(heavy_reds[0].id, "w-1");

        let not_red: Vec<Widget> = store.list(&[Filter::ne("color", "red")]).unwrap();
        assert_eq!(not_red.len(), 1);
        assert_eq!(not_red[0].id, "w-3");
    }

    #[test]
    fn test_rebuild_indexes() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.create(Widget::new("w-1", "red", false)).unwrap();
        store.create(Widget::new("w-2", "blue", false)).unwrap();

        let count = store.rebuild_indexes::<Widget>().unwrap();
        assert_eq!(count, 2);

        let blues: Vec<Widget> = store.list(&[Filter::eq("color", "blue")]).unwrap();
        assert_eq!(blues.len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = tempdir().unwrap();
        {
            let store = Store::open(temp.path()).unwrap();
            store.create(Widget::new("w-1", "red", false)).unwrap();
        }
        let store = Store::open(temp.path()).unwrap();
        let loaded: Option<Widget> = store.get("w-1").unwrap();
        assert!(loaded.is_some());
    }
}
