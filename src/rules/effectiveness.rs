//! Effectiveness tracking for applied rules.
//!
//! Recording an outcome counts the trigger, counts the success if there was
//! one, and stamps `last_triggered`, which re-arms the cooldown window.
//! Persistent stores perform the same update as one atomic statement.

use crate::rules::rule::Rule;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Apply one outcome to a rule and return the updated rule
pub fn record_outcome(mut rule: Rule, was_successful: bool, now: DateTime<Utc>) -> Rule {
    let effectiveness = &mut rule.configuration.effectiveness;
    effectiveness.total_triggers += 1;
    if was_successful {
        effectiveness.successful_adaptations += 1;
    }
    rule.last_triggered = Some(now);
    rule.updated_at = now;

    debug!(
        "Rule '{}' outcome recorded (success: {}), success rate now {:.1}%",
        rule.name,
        was_successful,
        rule.success_rate()
    );
    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::rule::{RuleCategory, TriggerType};

    #[test]
    fn test_counts_and_rate() {
        let now = Utc::now();
        let mut rule = Rule::new("tracked", RuleCategory::Engagement, TriggerType::Trigger);
        for success in [true, false, true, true] {
            rule = record_outcome(rule, success, now);
        }
        let eff = rule.configuration.effectiveness;
        assert_eq!(eff.total_triggers, 4);
        assert_eq!(eff.successful_adaptations, 3);
        assert!((rule.success_rate() - 75.0).abs() < 1e-9);
        assert_eq!(rule.last_triggered, Some(now));
    }

    #[test]
    fn test_outcome_arms_cooldown() {
        let now = Utc::now();
        let rule = Rule::new("arming", RuleCategory::Engagement, TriggerType::Trigger)
            .with_cooldown_hours(24);
        assert!(!rule.in_cooldown(now));
        let rule = record_outcome(rule, false, now);
        assert!(rule.in_cooldown(now));
        assert_eq!(rule.success_rate(), 0.0);
    }
}
