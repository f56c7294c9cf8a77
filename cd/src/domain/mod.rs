//! Domain types for choredaemon
//!
//! Core records: ChoreTemplate, Occurrence, Person, RotationState,
//! Completion + CompletionShare, LedgerEntry + Balance, ArcadeSession +
//! ArcadeCompletion, SweepLog. All implement the chorestore Record trait.

mod arcade;
mod completion;
mod id;
mod ledger;
mod occurrence;
mod person;
mod rotation;
mod sweep_log;
mod template;

pub use arcade::{ArcadeCompletion, ArcadeSession, ArcadeState, BonusTier};
pub use completion::{Completion, CompletionShare};
pub use id::generate_id;
pub use ledger::{Balance, LedgerEntry, LedgerReason};
pub use occurrence::{AssignmentReason, Occurrence, OccurrenceStatus};
pub use person::{ClaimCounter, Person, PersonDirectory, StoreDirectory};
pub use rotation::RotationState;
pub use sweep_log::{SweepKind, SweepLog, SweepReport};
pub use template::{ChoreTemplate, DependencyEdge, ScheduleSpec};

// Re-export chorestore types for convenience
pub use chorestore::{Filter, FilterOp, IndexValue, Record, Store};
