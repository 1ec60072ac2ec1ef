//! Condition evaluation.
//!
//! Two condition shapes share one engine:
//! - `ConditionSet`: grouped optional thresholds attached to adaptation rules
//!   and recommendation templates
//! - `AdaptiveCondition`: single metric/operator/value triples used by prompt
//!   sub-rules and content adaptations
//!
//! Both read metrics through `MetricSource`, so evaluation is a pure read of
//! the context.

use crate::context::{weekday_name, Metric, MetricSource};
use crate::error::{Result, TutorflowError};
use crate::types::ConditionValue;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Performance thresholds (scores and rates are 0-100)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConditions {
    pub min_completion_rate: Option<f64>,
    pub max_completion_rate: Option<f64>,
    pub min_average_score: Option<f64>,
    pub max_average_score: Option<f64>,
    pub min_consecutive_failures: Option<u32>,
}

/// Engagement thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConditions {
    pub min_focus_score: Option<f64>,
    pub max_focus_score: Option<f64>,
    pub min_session_count: Option<u32>,
    pub max_session_count: Option<u32>,
    pub min_days_inactive: Option<u32>,
}

/// AI tutoring interaction thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiInteractionConditions {
    pub min_satisfaction_score: Option<f64>,
    pub max_satisfaction_score: Option<f64>,
    pub min_effectiveness_score: Option<f64>,
    pub max_effectiveness_score: Option<f64>,
    pub frustration_detected: Option<bool>,
}

/// Inclusive hour window; `start > end` wraps past midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour <= self.end
        } else {
            hour >= self.start || hour <= self.end
        }
    }
}

/// Timing restrictions on the evaluation instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConditions {
    pub time_of_day: Option<HourWindow>,
    /// Allowed weekdays; empty means any day
    pub day_of_week: Vec<Weekday>,
}

/// Grouped trigger conditions of a rule
///
/// Every group and every field is optional. A missing field places no
/// constraint; the whole set is the conjunction of every present field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceConditions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<EngagementConditions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_interaction: Option<AiInteractionConditions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingConditions>,
}

/// One flattened numeric constraint
#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Min(Metric, f64),
    Max(Metric, f64),
}

impl ConditionSet {
    /// True when no group carries any constraint
    pub fn is_empty(&self) -> bool {
        self.bounds().is_empty() && self.flag_requirements().is_empty() && {
            match &self.timing {
                None => true,
                Some(t) => t.time_of_day.is_none() && t.day_of_week.is_empty(),
            }
        }
    }

    fn bounds(&self) -> Vec<Bound> {
        let mut bounds = Vec::new();
        let mut push = |metric: Metric, min: Option<f64>, max: Option<f64>| {
            if let Some(v) = min {
                bounds.push(Bound::Min(metric, v));
            }
            if let Some(v) = max {
                bounds.push(Bound::Max(metric, v));
            }
        };

        if let Some(p) = &self.performance {
            push(Metric::CompletionRate, p.min_completion_rate, p.max_completion_rate);
            push(Metric::AverageScore, p.min_average_score, p.max_average_score);
            push(
                Metric::ConsecutiveFailures,
                p.min_consecutive_failures.map(f64::from),
                None,
            );
        }
        if let Some(e) = &self.engagement {
            push(Metric::FocusScore, e.min_focus_score, e.max_focus_score);
            push(
                Metric::SessionCount,
                e.min_session_count.map(f64::from),
                e.max_session_count.map(f64::from),
            );
            push(Metric::DaysInactive, e.min_days_inactive.map(f64::from), None);
        }
        if let Some(a) = &self.ai_interaction {
            push(Metric::AiSatisfaction, a.min_satisfaction_score, a.max_satisfaction_score);
            push(
                Metric::AiEffectiveness,
                a.min_effectiveness_score,
                a.max_effectiveness_score,
            );
        }
        bounds
    }

    fn flag_requirements(&self) -> Vec<(Metric, bool)> {
        self.ai_interaction
            .as_ref()
            .and_then(|a| a.frustration_detected)
            .map(|flag| vec![(Metric::FrustrationDetected, flag)])
            .unwrap_or_default()
    }

    /// Reject malformed bounds
    ///
    /// Every metric carrying both a min and a max must have min < max, and
    /// hour windows must name hours in 0..=23.
    pub fn validate(&self) -> Result<()> {
        let bounds = self.bounds();
        for bound in &bounds {
            if let Bound::Min(metric, min) = bound {
                let max = bounds.iter().find_map(|b| match b {
                    Bound::Max(m, v) if m == metric => Some(*v),
                    _ => None,
                });
                if let Some(max) = max {
                    if *min >= max {
                        return Err(TutorflowError::Validation(format!(
                            "{}: min ({}) must be less than max ({})",
                            metric, min, max
                        )));
                    }
                }
            }
        }

        if let Some(window) = self.timing.as_ref().and_then(|t| t.time_of_day) {
            if window.start > 23 || window.end > 23 {
                return Err(TutorflowError::Validation(format!(
                    "time_of_day hours must be within 0..=23 (got {}..{})",
                    window.start, window.end
                )));
            }
        }

        Ok(())
    }
}

/// Decide whether `conditions` hold for `source`
///
/// Bounds are inclusive. A bound on a metric the source cannot supply fails.
/// Does not re-validate min/max ordering; that happens at write time.
pub fn matches(conditions: &ConditionSet, source: &dyn MetricSource) -> bool {
    for bound in conditions.bounds() {
        let passed = match bound {
            Bound::Min(metric, min) => numeric(source, metric).is_some_and(|v| v >= min),
            Bound::Max(metric, max) => numeric(source, metric).is_some_and(|v| v <= max),
        };
        if !passed {
            return false;
        }
    }

    for (metric, expected) in conditions.flag_requirements() {
        if source.metric(metric) != Some(ConditionValue::Flag(expected)) {
            return false;
        }
    }

    if let Some(timing) = &conditions.timing {
        if let Some(window) = timing.time_of_day {
            match source.local_hour() {
                Some(hour) if window.contains(hour) => {}
                _ => return false,
            }
        }
        if !timing.day_of_week.is_empty() {
            match source.weekday() {
                Some(day) if timing.day_of_week.contains(&day) => {}
                _ => return false,
            }
        }
    }

    true
}

fn numeric(source: &dyn MetricSource, metric: Metric) -> Option<f64> {
    source.metric(metric).and_then(|v| v.as_number())
}

/// Comparison operator for adaptive conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
    In,
    NotIn,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::In => "in",
            Operator::NotIn => "not in",
        };
        write!(f, "{}", symbol)
    }
}

/// Single metric comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveCondition {
    pub metric: Metric,
    pub operator: Operator,
    pub value: ConditionValue,
}

impl AdaptiveCondition {
    pub fn new(metric: Metric, operator: Operator, value: impl Into<ConditionValue>) -> Self {
        Self {
            metric,
            operator,
            value: value.into(),
        }
    }

    /// Evaluate against a metric source
    ///
    /// Ordering operators only apply to numbers. A missing metric satisfies
    /// nothing, not even `ne`/`not_in`.
    pub fn evaluate(&self, source: &dyn MetricSource) -> bool {
        let Some(actual) = self.metric_value(source) else {
            return false;
        };

        match self.operator {
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                match (actual.as_number(), self.value.as_number()) {
                    (Some(a), Some(b)) => match self.operator {
                        Operator::Gt => a > b,
                        Operator::Gte => a >= b,
                        Operator::Lt => a < b,
                        _ => a <= b,
                    },
                    _ => false,
                }
            }
            Operator::Eq => actual.same_as(&self.value),
            Operator::Ne => !actual.same_as(&self.value),
            Operator::In => actual.is_member_of(&self.value),
            Operator::NotIn => {
                matches!(self.value, ConditionValue::List(_)) && !actual.is_member_of(&self.value)
            }
        }
    }

    fn metric_value(&self, source: &dyn MetricSource) -> Option<ConditionValue> {
        match self.metric {
            Metric::DayOfWeek => source
                .weekday()
                .map(|d| ConditionValue::from(weekday_name(d)))
                .or_else(|| source.metric(Metric::DayOfWeek)),
            metric => source.metric(metric),
        }
    }
}

impl fmt::Display for AdaptiveCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.operator, self.value)
    }
}

/// Conjunction of adaptive conditions; an empty list always holds
pub fn all_match(conditions: &[AdaptiveCondition], source: &dyn MetricSource) -> bool {
    conditions.iter().all(|c| c.evaluate(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSnapshot;
    use crate::types::{Difficulty, LearningStyle};

    fn context() -> ContextSnapshot {
        let mut ctx = ContextSnapshot::new(10, Weekday::Tue);
        ctx.completion_rate = 20.0;
        ctx.average_score = 65.0;
        ctx.focus_score = 40.0;
        ctx.session_count = 5;
        ctx.ai_satisfaction = 70.0;
        ctx.ai_effectiveness = 55.0;
        ctx
    }

    #[test]
    fn test_empty_set_matches() {
        let set = ConditionSet::default();
        assert!(set.is_empty());
        assert!(matches(&set, &context()));
    }

    #[test]
    fn test_max_completion_rate() {
        let set = ConditionSet {
            performance: Some(PerformanceConditions {
                max_completion_rate: Some(30.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut ctx = context();
        assert!(matches(&set, &ctx));
        ctx.completion_rate = 40.0;
        assert!(!matches(&set, &ctx));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let set = ConditionSet {
            engagement: Some(EngagementConditions {
                min_focus_score: Some(40.0),
                max_session_count: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches(&set, &context()));
    }

    #[test]
    fn test_all_groups_must_pass() {
        let set = ConditionSet {
            performance: Some(PerformanceConditions {
                max_completion_rate: Some(30.0),
                ..Default::default()
            }),
            ai_interaction: Some(AiInteractionConditions {
                min_effectiveness_score: Some(60.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!matches(&set, &context()));
    }

    #[test]
    fn test_frustration_flag() {
        let set = ConditionSet {
            ai_interaction: Some(AiInteractionConditions {
                frustration_detected: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut ctx = context();
        assert!(!matches(&set, &ctx));
        ctx.frustration_detected = true;
        assert!(matches(&set, &ctx));
    }

    #[test]
    fn test_time_of_day_window() {
        let set = ConditionSet {
            timing: Some(TimingConditions {
                time_of_day: Some(HourWindow { start: 8, end: 12 }),
                day_of_week: vec![],
            }),
            ..Default::default()
        };
        let mut ctx = context();
        assert!(matches(&set, &ctx));
        ctx.hour_of_day = 13;
        assert!(!matches(&set, &ctx));
    }

    #[test]
    fn test_time_of_day_wraps_midnight() {
        let window = HourWindow { start: 22, end: 5 };
        assert!(window.contains(23));
        assert!(window.contains(0));
        assert!(window.contains(5));
        assert!(!window.contains(12));
    }

    #[test]
    fn test_day_of_week_membership() {
        let set = ConditionSet {
            timing: Some(TimingConditions {
                time_of_day: None,
                day_of_week: vec![Weekday::Sat, Weekday::Sun],
            }),
            ..Default::default()
        };
        let mut ctx = context();
        assert!(!matches(&set, &ctx));
        ctx.weekday = Weekday::Sun;
        assert!(matches(&set, &ctx));
    }

    #[test]
    fn test_validate_rejects_min_not_below_max() {
        let set = ConditionSet {
            performance: Some(PerformanceConditions {
                min_average_score: Some(80.0),
                max_average_score: Some(80.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = set.validate().unwrap_err();
        assert!(err.to_string().contains("average_score"));

        let ok = ConditionSet {
            performance: Some(PerformanceConditions {
                min_average_score: Some(40.0),
                max_average_score: Some(80.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_hours() {
        let set = ConditionSet {
            timing: Some(TimingConditions {
                time_of_day: Some(HourWindow { start: 8, end: 24 }),
                day_of_week: vec![],
            }),
            ..Default::default()
        };
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_condition_set_deserializes_partial_groups() {
        let set: ConditionSet =
            serde_json::from_str(r#"{"performance": {"max_completion_rate": 30}}"#).unwrap();
        assert_eq!(
            set.performance.as_ref().unwrap().max_completion_rate,
            Some(30.0)
        );
        assert!(set.engagement.is_none());
    }

    #[test]
    fn test_adaptive_numeric_operators() {
        let ctx = context();
        assert!(AdaptiveCondition::new(Metric::AverageScore, Operator::Lt, 70.0).evaluate(&ctx));
        assert!(AdaptiveCondition::new(Metric::AverageScore, Operator::Gte, 65.0).evaluate(&ctx));
        assert!(!AdaptiveCondition::new(Metric::AverageScore, Operator::Gt, 65.0).evaluate(&ctx));
        // Numeric operator against text never passes
        assert!(!AdaptiveCondition::new(Metric::AverageScore, Operator::Lt, "70").evaluate(&ctx));
    }

    #[test]
    fn test_adaptive_membership_and_missing_metrics() {
        let mut ctx = context();
        let cond = AdaptiveCondition::new(
            Metric::LearningStyle,
            Operator::In,
            ConditionValue::List(vec!["visual".into(), "kinesthetic".into()]),
        );
        assert!(!cond.evaluate(&ctx));
        ctx.learning_style = Some(LearningStyle::Visual);
        assert!(cond.evaluate(&ctx));

        let ne = AdaptiveCondition::new(Metric::Difficulty, Operator::Ne, "expert");
        assert!(!ne.evaluate(&ctx));
        ctx.difficulty = Some(Difficulty::Beginner);
        assert!(ne.evaluate(&ctx));
    }

    #[test]
    fn test_adaptive_day_of_week() {
        let ctx = context();
        let cond = AdaptiveCondition::new(Metric::DayOfWeek, Operator::Eq, "tuesday");
        assert!(cond.evaluate(&ctx));
        assert!(all_match(&[], &ctx));
        assert!(!all_match(
            &[cond, AdaptiveCondition::new(Metric::SessionCount, Operator::Gt, 10.0)],
            &ctx
        ));
    }
}
