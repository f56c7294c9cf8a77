//! Arcade sessions and high-score entries
//!
//! An arcade session is a timed, judged run at one occurrence. Elapsed
//! time accumulates across attempts; rank is always computed by sorting
//! finalized times, never stored.

use chorestore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcadeState {
    /// Timer running
    Active,
    /// Timer stopped, awaiting judgment
    Stopped,
    /// Judge accepted; terminal, settles points
    Approved,
    /// Judge rejected; may continue into another attempt
    Denied,
    /// Abandoned; terminal
    Cancelled,
}

impl ArcadeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Cancelled)
    }
}

impl std::fmt::Display for ArcadeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Stopped => write!(f, "stopped"),
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A timed run at one occurrence by one person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcadeSession {
    /// Unique identifier
    pub id: String,

    pub occurrence_id: String,
    pub template_id: String,

    /// Session owner (the runner)
    pub person_id: String,

    pub state: ArcadeState,

    /// Accumulated elapsed time across attempts, in milliseconds
    pub elapsed_ms: i64,

    /// Start of the running attempt; None unless Active
    pub started_at: Option<i64>,

    /// Attempt number, starting at 1
    pub attempt: u32,

    /// Judge of the most recent approve/deny
    pub judge: Option<String>,

    /// The occurrence was claimed from the pool for this session
    pub claimed_from_pool: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl ArcadeSession {
    pub fn start(
        occurrence_id: impl Into<String>,
        template_id: impl Into<String>,
        person_id: impl Into<String>,
        now_ms_at: i64,
        claimed_from_pool: bool,
    ) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("arcade", "session"),
            occurrence_id: occurrence_id.into(),
            template_id: template_id.into(),
            person_id: person_id.into(),
            state: ArcadeState::Active,
            elapsed_ms: 0,
            started_at: Some(now_ms_at),
            attempt: 1,
            judge: None,
            claimed_from_pool,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stop the timer, folding the running attempt into the accumulator
    pub fn stop(&mut self, now_ms_at: i64) {
        if let Some(started) = self.started_at.take() {
            self.elapsed_ms += (now_ms_at - started).max(0);
        }
        self.state = ArcadeState::Stopped;
        self.updated_at = now_ms();
    }

    pub fn approve(&mut self, judge: impl Into<String>) {
        self.state = ArcadeState::Approved;
        self.judge = Some(judge.into());
        self.updated_at = now_ms();
    }

    pub fn deny(&mut self, judge: impl Into<String>) {
        self.state = ArcadeState::Denied;
        self.judge = Some(judge.into());
        self.updated_at = now_ms();
    }

    /// Resume after a denial; elapsed time is preserved, not reset
    pub fn resume(&mut self, now_ms_at: i64) {
        self.state = ArcadeState::Active;
        self.started_at = Some(now_ms_at);
        self.attempt += 1;
        self.updated_at = now_ms();
    }

    pub fn cancel(&mut self) {
        self.state = ArcadeState::Cancelled;
        self.started_at = None;
        self.updated_at = now_ms();
    }
}

impl Record for ArcadeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "arcade_sessions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("occurrence".to_string(), IndexValue::String(self.occurrence_id.clone()));
        fields.insert("template".to_string(), IndexValue::String(self.template_id.clone()));
        fields.insert("person".to_string(), IndexValue::String(self.person_id.clone()));
        fields.insert("state".to_string(), IndexValue::String(self.state.to_string()));
        fields
    }
}

/// Bonus tier earned by an approved run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusTier {
    /// New all-time-fastest for the template
    AllTimeBest,
    /// Within the current top three
    TopThree,
    /// No bonus
    None,
}

/// A finalized arcade timing result - one per approved session
///
/// The high-score table for a template is every ArcadeCompletion sorted by
/// elapsed time; rank is a view, not a stored fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcadeCompletion {
    /// Unique identifier
    pub id: String,

    pub template_id: String,
    pub person_id: String,
    pub session_id: String,

    /// Final accumulated elapsed time
    pub elapsed_ms: i64,

    /// Attempts taken
    pub attempts: u32,

    pub bonus: BonusTier,

    pub created_at: i64,
}

impl ArcadeCompletion {
    pub fn new(session: &ArcadeSession, bonus: BonusTier) -> Self {
        Self {
            id: generate_id("highscore", "run"),
            template_id: session.template_id.clone(),
            person_id: session.person_id.clone(),
            session_id: session.id.clone(),
            elapsed_ms: session.elapsed_ms,
            attempts: session.attempt,
            bonus,
            created_at: now_ms(),
        }
    }
}

impl Record for ArcadeCompletion {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "arcade_completions"
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

    #[test]
    fn test_stop_accumulates_elapsed() {
        let mut session = ArcadeSession::start("occ-1", "t-1", "alice", 1_000, false);
        session.stop(4_500);
        assert_eq!(session.state, ArcadeState::Stopped);
        assert_eq!(session.elapsed_ms, 3_500);
        assert!(session.started_at.is_none());
    }

    #[test]
    fn test_deny_then_resume_preserves_elapsed_and_bumps_attempt() {
        let mut session = ArcadeSession::start("occ-1", "t-1", "alice", 1_000, false);
        session.stop(4_000);
        session.deny("bob");
        assert_eq!(session.state, ArcadeState::Denied);
        assert_eq!(session.judge.as_deref(), Some("bob"));

        session.resume(10_000);
        assert_eq!(session.state, ArcadeState::Active);
        assert_eq!(session.attempt, 2);
        assert_eq!(session.elapsed_ms, 3_000);

        session.stop(12_000);
        // 3s from attempt one plus 2s from attempt two
        assert_eq!(session.elapsed_ms, 5_000);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ArcadeState::Approved.is_terminal());
        assert!(ArcadeState::Cancelled.is_terminal());
        assert!(!ArcadeState::Active.is_terminal());
        assert!(!ArcadeState::Stopped.is_terminal());
        assert!(!ArcadeState::Denied.is_terminal());
    }

    #[test]
    fn test_arcade_completion_snapshot() {
        let mut session = ArcadeSession::start("occ-1", "t-1", "alice", 0, true);
        session.stop(60_000);
        session.approve("bob");

        let result = ArcadeCompletion::new(&session, BonusTier::AllTimeBest);
        assert_eq!(result.elapsed_ms, 60_000);
        assert_eq!(result.template_id, "t-1");
        assert_eq!(result.bonus, BonusTier::AllTimeBest);
    }
}
