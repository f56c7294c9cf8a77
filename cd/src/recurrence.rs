//! Recurrence evaluation - decides whether a template is due on a date
//!
//! Rules in priority order: reschedule override, one-off, daily, weekly,
//! every-N-days, cron-like rule. Dependency children never schedule
//! themselves regardless of their own descriptor.

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::domain::{ChoreTemplate, ScheduleSpec};
use crate::error::{CoreError, CoreResult};

/// Is this template due on `date`?
///
/// `creation_date` is the template's creation date in household-local
/// terms; rule-based templates treat it as an implicit start.
pub fn due_on(template: &ChoreTemplate, date: NaiveDate, creation_date: NaiveDate) -> bool {
    // Children only ever spawn from their parent's completion
    if template.is_dependency_child() {
        return false;
    }

    // An explicit reschedule overrides everything else
    if let Some(target) = template.reschedule_to {
        return target == date;
    }

    match &template.schedule {
        ScheduleSpec::Once { .. } => false,
        ScheduleSpec::Daily => true,
        ScheduleSpec::Weekly { weekday } => date.weekday().num_days_from_monday() == *weekday as u32,
        ScheduleSpec::EveryNDays { n, anchor } => {
            if *n == 0 || date < *anchor {
                return false;
            }
            (date - *anchor).num_days() % *n as i64 == 0
        }
        ScheduleSpec::Rule { expr } => {
            if date < creation_date {
                return false;
            }
            match RuleMatcher::parse(expr) {
                Ok(matcher) => matcher.matches(date),
                Err(e) => {
                    warn!(template_id = %template.id, %expr, error = %e, "Unparseable schedule rule treated as not due");
                    false
                }
            }
        }
    }
}

/// One field of a cron-like rule
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldPat {
    Any,
    Values(Vec<u32>),
}

impl FieldPat {
    fn matches(&self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Values(values) => values.contains(&value),
        }
    }
}

/// Cron-like date matcher: `"dom mon dow"`
///
/// Each field is `*`, a value, a comma list, or an inclusive range.
/// Weekday numbering is 0 = Monday .. 6 = Sunday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatcher {
    dom: FieldPat,
    mon: FieldPat,
    dow: FieldPat,
}

impl RuleMatcher {
    pub fn parse(expr: &str) -> CoreResult<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(CoreError::validation(format!(
                "Schedule rule must have 3 fields (dom mon dow): {}",
                expr
            )));
        }
        Ok(Self {
            dom: Self::parse_field(fields[0], 1, 31)?,
            mon: Self::parse_field(fields[1], 1, 12)?,
            dow: Self::parse_field(fields[2], 0, 6)?,
        })
    }

    fn parse_field(field: &str, min: u32, max: u32) -> CoreResult<FieldPat> {
        if field == "*" {
            return Ok(FieldPat::Any);
        }
        let mut values = Vec::new();
        for part in field.split(',') {
            if let Some((lo, hi)) = part.split_once('-') {
                let lo = Self::parse_value(lo, min, max)?;
                let hi = Self::parse_value(hi, min, max)?;
                if lo > hi {
                    return Err(CoreError::validation(format!("Backwards range: {}", part)));
                }
                values.extend(lo..=hi);
            } else {
                values.push(Self::parse_value(part, min, max)?);
            }
        }
        Ok(FieldPat::Values(values))
    }

    fn parse_value(s: &str, min: u32, max: u32) -> CoreResult<u32> {
        let value: u32 = s
            .parse()
            .map_err(|_| CoreError::validation(format!("Invalid rule value: {}", s)))?;
        if value < min || value > max {
            return Err(CoreError::validation(format!(
                "Rule value {} outside {}..={}",
                value, min, max
            )));
        }
        Ok(value)
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        self.dom.matches(date.day())
            && self.mon.matches(date.month())
            && self.dow.matches(date.weekday().num_days_from_monday())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::Points;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template(schedule: ScheduleSpec) -> ChoreTemplate {
        ChoreTemplate::new("Test", Points::from_whole(1), schedule)
    }

    #[test]
    fn test_daily_always_due() {
        let t = template(ScheduleSpec::Daily);
        assert!(due_on(&t, date(2026, 3, 2), date(2026, 1, 1)));
        assert!(due_on(&t, date(2026, 3, 3), date(2026, 1, 1)));
    }

    #[test]
    fn test_weekly_matches_weekday() {
        // 2026-03-02 is a Monday
        let t = template(ScheduleSpec::Weekly { weekday: 0 });
        assert!(due_on(&t, date(2026, 3, 2), date(2026, 1, 1)));
        assert!(!due_on(&t, date(2026, 3, 3), date(2026, 1, 1)));
        assert!(due_on(&t, date(2026, 3, 9), date(2026, 1, 1)));
    }

    #[test]
    fn test_every_n_days_from_anchor() {
        let t = template(ScheduleSpec::EveryNDays {
            n: 3,
            anchor: date(2026, 3, 1),
        });
        assert!(due_on(&t, date(2026, 3, 1), date(2026, 1, 1)));
        assert!(!due_on(&t, date(2026, 3, 2), date(2026, 1, 1)));
        assert!(!due_on(&t, date(2026, 3, 3), date(2026, 1, 1)));
        assert!(due_on(&t, date(2026, 3, 4), date(2026, 1, 1)));
        // Before the anchor: never due
        assert!(!due_on(&t, date(2026, 2, 26), date(2026, 1, 1)));
    }

    #[test]
    fn test_once_never_due_via_sweep() {
        let t = template(ScheduleSpec::Once {
            due_on: Some(date(2026, 3, 5)),
        });
        assert!(!due_on(&t, date(2026, 3, 5), date(2026, 1, 1)));
    }

    #[test]
    fn test_reschedule_overrides_schedule() {
        // Weekly template rescheduled onto a Tuesday
        let mut t = template(ScheduleSpec::Weekly { weekday: 0 });
        t.set_reschedule(date(2026, 3, 3));
        assert!(due_on(&t, date(2026, 3, 3), date(2026, 1, 1)));
        // The override suppresses the normal weekday too
        assert!(!due_on(&t, date(2026, 3, 2), date(2026, 1, 1)));
    }

    #[test]
    fn test_dependency_child_never_due() {
        let t = template(ScheduleSpec::Daily).with_dependency("parent", 2);
        assert!(!due_on(&t, date(2026, 3, 2), date(2026, 1, 1)));

        // Even a reschedule override cannot make a child due
        let mut t = template(ScheduleSpec::Daily).with_dependency("parent", 2);
        t.set_reschedule(date(2026, 3, 3));
        assert!(!due_on(&t, date(2026, 3, 3), date(2026, 1, 1)));
    }

    #[test]
    fn test_rule_first_and_fifteenth() {
        let t = template(ScheduleSpec::Rule {
            expr: "1,15 * *".to_string(),
        });
        assert!(due_on(&t, date(2026, 3, 1), date(2026, 1, 1)));
        assert!(due_on(&t, date(2026, 3, 15), date(2026, 1, 1)));
        assert!(!due_on(&t, date(2026, 3, 2), date(2026, 1, 1)));
    }

    #[test]
    fn test_rule_weekday_range() {
        // Weekdays Monday-Friday
        let t = template(ScheduleSpec::Rule {
            expr: "* * 0-4".to_string(),
        });
        assert!(due_on(&t, date(2026, 3, 2), date(2026, 1, 1))); // Monday
        assert!(due_on(&t, date(2026, 3, 6), date(2026, 1, 1))); // Friday
        assert!(!due_on(&t, date(2026, 3, 7), date(2026, 1, 1))); // Saturday
    }

    #[test]
    fn test_rule_implicit_start_at_creation() {
        let t = template(ScheduleSpec::Rule {
            expr: "* * *".to_string(),
        });
        assert!(!due_on(&t, date(2026, 2, 1), date(2026, 3, 1)));
        assert!(due_on(&t, date(2026, 3, 1), date(2026, 3, 1)));
    }

    #[test]
    fn test_rule_parse_errors() {
        assert!(RuleMatcher::parse("1 2").is_err());
        assert!(RuleMatcher::parse("32 * *").is_err());
        assert!(RuleMatcher::parse("* 13 *").is_err());
        assert!(RuleMatcher::parse("* * 7").is_err());
        assert!(RuleMatcher::parse("5-2 * *").is_err());
        assert!(RuleMatcher::parse("x * *").is_err());
    }

    #[test]
    fn test_unparseable_rule_not_due() {
        let t = template(ScheduleSpec::Rule {
            expr: "bogus".to_string(),
        });
        assert!(!due_on(&t, date(2026, 3, 2), date(2026, 1, 1)));
    }
}
