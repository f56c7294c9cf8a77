//! ChoreStore - generic persistent state management
//!
//! Records are serde-serializable structs implementing the [`Record`] trait.
//! Each record belongs to a named collection, carries its own id and
//! updated-at timestamp, and declares the fields it wants secondary indexes
//! on. The [`Store`] persists records as JSON rows in SQLite and answers
//! filtered listings from the index table.

mod record;
mod store;

pub use record::{Filter, FilterOp, IndexValue, Record};
pub use store::Store;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
