//! Choredaemon - household chore scheduling, fair rotation, and points
//!
//! The core manages one household's task pool: a time-driven scheduler
//! materializes occurrences from recurrence rules, a rotation service
//! assigns undesirable chores fairly, completions settle through an
//! append-only points ledger, and an optional timed "arcade" path adds
//! judged runs with a dynamic high-score bonus.
//!
//! # Core Concepts
//!
//! - **Occurrences, not tasks**: templates describe recurrence; the sweep
//!   stamps dated occurrences, at most one open per template
//! - **Typed outcomes**: assignment and every rejected operation carry a
//!   specific reason, never a bare boolean or generic failure
//! - **Row locks, not a global lock**: each state change locks only its
//!   occurrence, re-reads under the lock, then mutates
//! - **Append-only ledger**: undo mirrors entries, it never erases history
//!
//! # Modules
//!
//! - [`domain`] - records: templates, occurrences, completions, ledger
//! - [`recurrence`] - due-today evaluation, cron-like rules
//! - [`sweep`] - the daily and frequent scheduler loops
//! - [`assign`] - rotation/fairness assignment
//! - [`service`] - the operation surface (claim, complete, undo, arcade)
//! - [`hooks`] - outbound fire-and-forget notifications
//! - [`config`] - configuration types and loading

pub mod assign;
pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod ledger;
pub mod locks;
pub mod points;
pub mod recurrence;
pub mod service;
pub mod settings;
pub mod sweep;

// Re-export commonly used types
pub use assign::{AssignOutcome, pick_assignee};
pub use clock::{Clock, FAR_FUTURE_MS, ManualClock, SystemClock};
pub use config::Config;
pub use domain::{
    ArcadeCompletion, ArcadeSession, ArcadeState, AssignmentReason, Balance, BonusTier, ChoreTemplate, ClaimCounter,
    Completion, CompletionShare, DependencyEdge, LedgerEntry, LedgerReason, Occurrence, OccurrenceStatus, Person,
    PersonDirectory, RotationState, ScheduleSpec, StoreDirectory, SweepKind, SweepLog, SweepReport,
};
pub use error::{CoreError, CoreResult};
pub use hooks::{Hook, HookBus};
pub use locks::RowLocks;
pub use points::Points;
pub use service::ChoreService;
pub use settings::{Settings, SettingsSource, SharedSettings};
pub use sweep::Sweeper;
