//! Credit-set resolution and share splitting
//!
//! Pure functions: the service fetches the people involved, this module
//! decides who gets credited and with how much. Splitting is always even,
//! with the remainder lost to rounding - never redistributed.

use crate::domain::{ChoreTemplate, Person};
use crate::points::Points;

/// Who gets credited for a completion
///
/// Priority order:
/// 1. An explicit helper list, filtered to points-eligible persons.
/// 2. For undesirable chores, the eligibility list's points-eligible members.
/// 3. The completer alone, when points-eligible.
/// 4. Fallback: every points-eligible capable person in the household, so a
///    point-ineligible completer's effort still lands somewhere.
pub fn resolve_credited(
    template: &ChoreTemplate,
    completer: &Person,
    explicit_helpers: Option<Vec<Person>>,
    eligible_persons: Vec<Person>,
    household: Vec<Person>,
) -> Vec<String> {
    if let Some(helpers) = explicit_helpers {
        return helpers
            .into_iter()
            .filter(|p| p.points_eligible)
            .map(|p| p.id)
            .collect();
    }

    if template.undesirable {
        let credited: Vec<String> = eligible_persons
            .into_iter()
            .filter(|p| p.points_eligible)
            .map(|p| p.id)
            .collect();
        if !credited.is_empty() {
            return credited;
        }
    }

    if completer.points_eligible {
        return vec![completer.id.clone()];
    }

    household
        .into_iter()
        .filter(|p| p.points_eligible && p.is_capable())
        .map(|p| p.id)
        .collect()
}

/// Even split of `total` across the credited persons
///
/// Each share is `total / n` truncated to hundredths; the remainder is
/// absorbed, never handed to anyone.
pub fn split_shares(total: Points, credited: &[String]) -> Vec<(String, Points)> {
    if credited.is_empty() {
        return Vec::new();
    }
    let share = total.split_even(credited.len());
    credited.iter().map(|id| (id.clone(), share)).collect()
}
