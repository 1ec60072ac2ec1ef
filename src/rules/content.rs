//! Content-level adaptations for learning modules and questions.
//!
//! Modules and questions carry small lists of "if metric op value then
//! adjust" entries. They are evaluated by the same condition engine as
//! learner-level rules.

use crate::context::MetricSource;
use crate::rules::conditions::{all_match, AdaptiveCondition};
use crate::types::Difficulty;
use serde::{Deserialize, Serialize};

/// What a matching content adaptation changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ContentAction {
    /// Serve the content at a different difficulty
    SetDifficulty { difficulty: Difficulty },
    /// Show a hint before the learner answers
    ShowHint { hint: String },
    /// Add extra practice items
    AddPractice { count: u32 },
    /// Skip the content entirely
    Skip,
    /// Extend the time limit by a percentage
    ExtendTime { percent: u32 },
}

/// One adaptive entry attached to a module or question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAdaptation {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<AdaptiveCondition>,
    pub action: ContentAction,
    #[serde(default)]
    pub priority: u8,
}

/// Adaptations whose conditions all hold, highest priority first (stable)
pub fn applicable_adaptations<'a>(
    adaptations: &'a [ContentAdaptation],
    source: &dyn MetricSource,
) -> Vec<&'a ContentAdaptation> {
    let mut matching: Vec<&ContentAdaptation> = adaptations
        .iter()
        .filter(|a| all_match(&a.conditions, source))
        .collect();
    matching.sort_by(|a, b| b.priority.cmp(&a.priority));
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextSnapshot, Metric};
    use crate::rules::conditions::Operator;
    use chrono::Weekday;

    fn adaptations() -> Vec<ContentAdaptation> {
        vec![
            ContentAdaptation {
                name: "hint-on-failures".to_string(),
                conditions: vec![AdaptiveCondition::new(
                    Metric::ConsecutiveFailures,
                    Operator::Gte,
                    2.0,
                )],
                action: ContentAction::ShowHint {
                    hint: "Re-read the worked example".to_string(),
                },
                priority: 3,
            },
            ContentAdaptation {
                name: "easier-for-low-scores".to_string(),
                conditions: vec![AdaptiveCondition::new(Metric::AverageScore, Operator::Lt, 50.0)],
                action: ContentAction::SetDifficulty {
                    difficulty: Difficulty::Beginner,
                },
                priority: 8,
            },
            ContentAdaptation {
                name: "always".to_string(),
                conditions: vec![],
                action: ContentAction::ExtendTime { percent: 10 },
                priority: 1,
            },
        ]
    }

    #[test]
    fn test_matching_adaptations_in_priority_order() {
        let mut ctx = ContextSnapshot::new(9, Weekday::Wed);
        ctx.average_score = 40.0;
        ctx.consecutive_failures = 3;

        let list = adaptations();
        let names: Vec<&str> = applicable_adaptations(&list, &ctx)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["easier-for-low-scores", "hint-on-failures", "always"]);
    }

    #[test]
    fn test_unconditional_only() {
        let mut ctx = ContextSnapshot::new(9, Weekday::Wed);
        ctx.average_score = 90.0;
        let list = adaptations();
        let matched = applicable_adaptations(&list, &ctx);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].action, ContentAction::ExtendTime { percent: 10 });
    }

    #[test]
    fn test_action_serde_shape() {
        let json = serde_json::to_value(ContentAction::AddPractice { count: 2 }).unwrap();
        assert_eq!(json["type"], "add_practice");
        assert_eq!(json["count"], 2);
    }
}
