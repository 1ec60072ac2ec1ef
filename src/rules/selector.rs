//! Rule selection: filter candidate rules for a learner and rank them.

use crate::context::ContextSnapshot;
use crate::rules::conditions::matches;
use crate::rules::rule::Rule;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::debug;

/// Why a candidate rule was not selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Inactive,
    NotTargeted,
    NotApplicable,
    Cooldown,
    ConditionsUnmet,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Inactive => write!(f, "inactive"),
            Exclusion::NotTargeted => write!(f, "not targeted at user"),
            Exclusion::NotApplicable => write!(f, "not applicable to context"),
            Exclusion::Cooldown => write!(f, "in cooldown"),
            Exclusion::ConditionsUnmet => write!(f, "conditions unmet"),
        }
    }
}

/// First reason `rule` is excluded for this user and context, if any
pub fn exclusion_reason(
    rule: &Rule,
    context: &ContextSnapshot,
    user_id: &str,
    now: DateTime<Utc>,
) -> Option<Exclusion> {
    if !rule.is_active {
        return Some(Exclusion::Inactive);
    }
    if !rule.scope.includes(user_id) {
        return Some(Exclusion::NotTargeted);
    }
    if !rule.applicability.allows(
        context.category.as_deref(),
        context.difficulty,
        context.learning_style,
    ) {
        return Some(Exclusion::NotApplicable);
    }
    if rule.in_cooldown(now) {
        return Some(Exclusion::Cooldown);
    }
    if !matches(&rule.conditions, context) {
        return Some(Exclusion::ConditionsUnmet);
    }
    None
}

/// Rules that apply to `user_id` in `context`, highest priority first
///
/// Rules in cooldown are dropped outright. Equal priorities keep their
/// input order. An empty result is a normal outcome.
pub fn select_applicable(
    rules: &[Rule],
    context: &ContextSnapshot,
    user_id: &str,
    now: DateTime<Utc>,
) -> Vec<Rule> {
    let mut selected: Vec<Rule> = rules
        .iter()
        .filter(|rule| match exclusion_reason(rule, context, user_id, now) {
            None => true,
            Some(reason) => {
                debug!("Rule '{}' excluded for {}: {}", rule.name, user_id, reason);
                false
            }
        })
        .cloned()
        .collect();

    // sort_by is stable
    selected.sort_by(|a, b| b.configuration.priority.cmp(&a.configuration.priority));

    debug!(
        "Selected {} of {} rules for user {}",
        selected.len(),
        rules.len(),
        user_id
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::conditions::{ConditionSet, PerformanceConditions};
    use crate::rules::rule::{Applicability, RuleCategory, TriggerType};
    use crate::types::Difficulty;
    use chrono::{Duration, Weekday};

    fn low_completion_rule(name: &str, priority: u8) -> Rule {
        Rule::new(name, RuleCategory::Intervention, TriggerType::Trigger)
            .with_priority(priority)
            .with_conditions(ConditionSet {
                performance: Some(PerformanceConditions {
                    max_completion_rate: Some(30.0),
                    ..Default::default()
                }),
                ..Default::default()
            })
    }

    fn context(completion_rate: f64) -> ContextSnapshot {
        let mut ctx = ContextSnapshot::new(10, Weekday::Mon);
        ctx.completion_rate = completion_rate;
        ctx
    }

    #[test]
    fn test_scenario_low_completion() {
        let rules = vec![low_completion_rule("nudge", 9)];
        let now = Utc::now();

        let selected = select_applicable(&rules, &context(20.0), "u1", now);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "nudge");

        assert!(select_applicable(&rules, &context(40.0), "u1", now).is_empty());
    }

    #[test]
    fn test_cooldown_excludes() {
        let now = Utc::now();
        let mut rule = low_completion_rule("cooling", 5).with_cooldown_hours(24);

        rule.last_triggered = Some(now - Duration::hours(1));
        assert!(select_applicable(&[rule.clone()], &context(10.0), "u1", now).is_empty());

        rule.last_triggered = Some(now - Duration::hours(25));
        assert_eq!(select_applicable(&[rule], &context(10.0), "u1", now).len(), 1);
    }

    #[test]
    fn test_priority_order_is_stable() {
        let rules = vec![
            low_completion_rule("a", 5),
            low_completion_rule("b", 9),
            low_completion_rule("c", 5),
            low_completion_rule("d", 9),
        ];
        let names: Vec<String> = select_applicable(&rules, &context(10.0), "u1", Utc::now())
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_targeting_and_activity() {
        let now = Utc::now();
        let targeted = low_completion_rule("targeted", 5).targeted(vec!["u2".to_string()]);
        let mut inactive = low_completion_rule("inactive", 5);
        inactive.is_active = false;

        let ctx = context(10.0);
        assert_eq!(
            exclusion_reason(&targeted, &ctx, "u1", now),
            Some(Exclusion::NotTargeted)
        );
        assert_eq!(exclusion_reason(&targeted, &ctx, "u2", now), None);
        assert_eq!(
            exclusion_reason(&inactive, &ctx, "u2", now),
            Some(Exclusion::Inactive)
        );
    }

    #[test]
    fn test_applicability_restrictions() {
        let mut rule = low_completion_rule("advanced-only", 5);
        rule.applicability = Applicability {
            difficulties: vec![Difficulty::Advanced],
            ..Default::default()
        };
        let mut ctx = context(10.0);
        assert_eq!(
            exclusion_reason(&rule, &ctx, "u1", Utc::now()),
            Some(Exclusion::NotApplicable)
        );
        ctx.difficulty = Some(Difficulty::Advanced);
        assert_eq!(exclusion_reason(&rule, &ctx, "u1", Utc::now()), None);
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        assert!(select_applicable(&[], &context(10.0), "u1", Utc::now()).is_empty());
    }
}
