//! Outbound hook types
//!
//! Hooks are the core's fire-and-forget notifications to external
//! collaborators (the notification layer, UIs). They carry ids and enough
//! context for the consumer to render a message without reading back.

use serde::{Deserialize, Serialize};

use crate::points::Points;

/// Everything the core announces to the outside
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Hook {
    /// A person claimed a pool occurrence
    ChoreClaimed {
        occurrence_id: String,
        template_id: String,
        person_id: String,
    },
    /// An occurrence was completed and points settled
    ChoreCompleted {
        occurrence_id: String,
        template_id: String,
        completion_id: String,
        completed_by: String,
        points: Points,
        late: bool,
    },
    /// An open occurrence passed its due time (emitted once per transition)
    ChoreOverdue {
        occurrence_id: String,
        template_id: String,
    },
    /// The rotation service assigned a pool occurrence
    ChoreAssigned {
        occurrence_id: String,
        template_id: String,
        person_id: String,
    },
    /// An approved arcade run set a new all-time-fastest
    ArcadeNewRecord {
        template_id: String,
        person_id: String,
        elapsed_ms: i64,
    },
    /// Weekly point counters were reset
    WeeklyReset { persons: u32 },
}

impl Hook {
    /// Get the hook type name
    pub fn hook_type(&self) -> &'static str {
        match self {
            Hook::ChoreClaimed { .. } => "ChoreClaimed",
            Hook::ChoreCompleted { .. } => "ChoreCompleted",
            Hook::ChoreOverdue { .. } => "ChoreOverdue",
            Hook::ChoreAssigned { .. } => "ChoreAssigned",
            Hook::ArcadeNewRecord { .. } => "ArcadeNewRecord",
            Hook::WeeklyReset { .. } => "WeeklyReset",
        }
    }
}
