//! AI tutor prompt templates with usage metrics and A/B selection.
//!
//! Prompts sharing a personality and context type compete with each other.
//! With A/B testing enabled the winner is drawn proportionally to
//! `test_weight`; otherwise the best performer (effectiveness, then rating)
//! is used.

use crate::context::MetricSource;
use crate::error::{Result, TutorflowError};
use crate::rules::conditions::AdaptiveCondition;
use crate::scoring::{weighted_pick, RandomSource};
use crate::types::PromptId;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
pub const DEFAULT_TEST_WEIGHT: f64 = 50.0;

/// Share of the effectiveness score taken by the success rate
const SUCCESS_SHARE: f64 = 0.6;
/// Share of the effectiveness score taken by the normalized rating
const RATING_SHARE: f64 = 0.4;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("Valid placeholder regex")
});

/// Situation a prompt is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptContext {
    Explanation,
    Hint,
    Feedback,
    Encouragement,
    Assessment,
    GeneralChat,
}

impl fmt::Display for PromptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PromptContext::Explanation => "explanation",
            PromptContext::Hint => "hint",
            PromptContext::Feedback => "feedback",
            PromptContext::Encouragement => "encouragement",
            PromptContext::Assessment => "assessment",
            PromptContext::GeneralChat => "general_chat",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for PromptContext {
    type Err = TutorflowError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| TutorflowError::Validation(format!("Unknown prompt context: {}", s)))
    }
}

/// Where a template variable's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableSource {
    UserProfile,
    LearningProgress,
    SessionContext,
    Content,
    System,
}

/// Named placeholder declared by a prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextVariable {
    pub name: String,
    pub source: VariableSource,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
}

/// Extra instruction appended when its condition holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAdaptation {
    pub condition: AdaptiveCondition,
    pub modification: String,
    #[serde(default)]
    pub priority: u8,
}

/// Reject ratings outside 1..=5; no rating is always valid
pub fn validate_rating(rating: Option<u8>) -> Result<()> {
    match rating {
        Some(r) if !(MIN_RATING..=MAX_RATING).contains(&r) => Err(TutorflowError::Validation(
            format!("Rating must be within {}..={} (got {})", MIN_RATING, MAX_RATING, r),
        )),
        _ => Ok(()),
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptMetrics {
    pub use_count: u64,
    pub rated_count: u64,
    pub average_rating: f64,
    pub success_count: u64,
    pub success_rate: f64,
    pub effectiveness_score: f64,
    pub last_used: Option<DateTime<Utc>>,
}

impl PromptMetrics {
    /// Fold one use into the statistics
    pub fn record(&mut self, rating: Option<u8>, successful: bool, now: DateTime<Utc>) -> Result<()> {
        validate_rating(rating)?;

        self.use_count += 1;
        if successful {
            self.success_count += 1;
        }
        if let Some(r) = rating {
            let total = self.average_rating * self.rated_count as f64 + r as f64;
            self.rated_count += 1;
            self.average_rating = total / self.rated_count as f64;
        }
        self.success_rate = self.success_count as f64 / self.use_count as f64 * 100.0;
        self.effectiveness_score = if self.rated_count == 0 {
            self.success_rate
        } else {
            SUCCESS_SHARE * self.success_rate
                + RATING_SHARE * (self.average_rating / MAX_RATING as f64 * 100.0)
        };
        self.last_used = Some(now);
        Ok(())
    }
}

/// System and user prompt after substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// A prompt template competing for one (personality, context) slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(default)]
    pub id: PromptId,
    pub name: String,
    pub personality: String,
    pub context_type: PromptContext,
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default)]
    pub variables: Vec<ContextVariable>,
    #[serde(default)]
    pub adaptations: Vec<PromptAdaptation>,
    #[serde(default)]
    pub metrics: PromptMetrics,
    #[serde(default = "default_test_weight")]
    pub test_weight: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_test_weight() -> f64 {
    DEFAULT_TEST_WEIGHT
}

fn default_active() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

impl Prompt {
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        context_type: PromptContext,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PromptId::new(),
            name: name.into(),
            personality: personality.into(),
            context_type,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            variables: Vec::new(),
            adaptations: Vec::new(),
            metrics: PromptMetrics::default(),
            test_weight: DEFAULT_TEST_WEIGHT,
            is_active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_variable(mut self, variable: ContextVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_adaptation(mut self, adaptation: PromptAdaptation) -> Self {
        self.adaptations.push(adaptation);
        self
    }

    pub fn with_test_weight(mut self, weight: f64) -> Self {
        self.test_weight = weight;
        self
    }

    /// Name, templates and weight checks before persisting
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TutorflowError::Validation("Prompt name cannot be empty".to_string()));
        }
        if self.personality.trim().is_empty() {
            return Err(TutorflowError::Validation(
                "Prompt personality cannot be empty".to_string(),
            ));
        }
        if !self.test_weight.is_finite() || self.test_weight < 0.0 {
            return Err(TutorflowError::Validation(format!(
                "test_weight must be a non-negative number (got {})",
                self.test_weight
            )));
        }
        Ok(())
    }

    pub fn record_usage(&mut self, rating: Option<u8>, successful: bool) -> Result<()> {
        let now = Utc::now();
        self.metrics.record(rating, successful, now)?;
        self.updated_at = now;
        Ok(())
    }

    /// Substitute `{{var}}` placeholders and append matching adaptations
    ///
    /// Lookup order for each placeholder: supplied value, declared default,
    /// empty string for optional variables. A required variable without a
    /// value, or a placeholder that is neither supplied nor declared, is an
    /// error.
    pub fn render(
        &self,
        values: &HashMap<String, String>,
        context: &dyn MetricSource,
    ) -> Result<RenderedPrompt> {
        let mut system = self.substitute(&self.system_prompt, values)?;
        let user = self.substitute(&self.user_prompt, values)?;

        let mut applicable: Vec<&PromptAdaptation> = self
            .adaptations
            .iter()
            .filter(|a| a.condition.evaluate(context))
            .collect();
        applicable.sort_by(|a, b| b.priority.cmp(&a.priority));

        for adaptation in applicable {
            debug!("Prompt '{}' adapted: {}", self.name, adaptation.condition);
            system.push_str("\n\n");
            system.push_str(&adaptation.modification);
        }

        Ok(RenderedPrompt { system, user })
    }

    fn substitute(&self, template: &str, values: &HashMap<String, String>) -> Result<String> {
        let mut missing: Option<String> = None;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            if let Some(value) = values.get(name) {
                return value.clone();
            }
            match self.variables.iter().find(|v| v.name == name) {
                Some(var) => match (&var.default, var.required) {
                    (Some(default), _) => default.clone(),
                    (None, false) => String::new(),
                    (None, true) => {
                        missing.get_or_insert_with(|| format!("Missing required variable '{}'", name));
                        String::new()
                    }
                },
                None => {
                    missing.get_or_insert_with(|| format!("Undeclared placeholder '{}'", name));
                    String::new()
                }
            }
        });

        match missing {
            Some(message) => Err(TutorflowError::Template(message)),
            None => Ok(rendered.into_owned()),
        }
    }
}

/// Best performer first: effectiveness, then average rating
fn rank(a: &Prompt, b: &Prompt) -> Ordering {
    b.metrics
        .effectiveness_score
        .total_cmp(&a.metrics.effectiveness_score)
        .then_with(|| b.metrics.average_rating.total_cmp(&a.metrics.average_rating))
}

/// Choose the prompt to use for a personality and context
pub fn select_prompt<'a>(
    candidates: &'a [Prompt],
    personality: &str,
    context_type: PromptContext,
    ab_testing: bool,
    rng: &mut dyn RandomSource,
) -> Result<&'a Prompt> {
    let eligible: Vec<&Prompt> = candidates
        .iter()
        .filter(|p| p.is_active && p.personality == personality && p.context_type == context_type)
        .collect();

    if eligible.is_empty() {
        warn!("No active prompt for {}/{}", personality, context_type);
        return Err(TutorflowError::NoEligibleCandidate(format!(
            "no active prompt for personality '{}' and context '{}'",
            personality, context_type
        )));
    }

    if ab_testing && eligible.len() > 1 {
        let weights: Vec<f64> = eligible.iter().map(|p| p.test_weight).collect();
        let index = weighted_pick(&weights, rng).unwrap_or(0);
        debug!(
            "A/B picked prompt '{}' ({} of {})",
            eligible[index].name,
            index + 1,
            eligible.len()
        );
        return Ok(eligible[index]);
    }

    let mut ranked = eligible;
    ranked.sort_by(|a, b| rank(a, b));
    Ok(ranked[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextSnapshot, Metric};
    use crate::rules::conditions::Operator;
    use crate::scoring::{FixedSequence, SeededRandom};
    use chrono::Weekday;

    fn prompt(name: &str, weight: f64) -> Prompt {
        Prompt::new(
            name,
            "socratic",
            PromptContext::Hint,
            "You are a patient tutor.",
            "Help with {{topic}}",
        )
        .with_test_weight(weight)
    }

    #[test]
    fn test_record_usage_metrics() {
        let mut p = prompt("a", 1.0);
        p.record_usage(Some(5), true).unwrap();
        p.record_usage(Some(3), false).unwrap();
        p.record_usage(None, true).unwrap();

        let m = p.metrics;
        assert_eq!(m.use_count, 3);
        assert_eq!(m.rated_count, 2);
        assert!((m.average_rating - 4.0).abs() < 1e-9);
        assert!((m.success_rate - 200.0 / 3.0).abs() < 1e-9);
        let expected = 0.6 * (200.0 / 3.0) + 0.4 * 80.0;
        assert!((m.effectiveness_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unrated_effectiveness_is_success_rate() {
        let mut p = prompt("a", 1.0);
        p.record_usage(None, true).unwrap();
        p.record_usage(None, false).unwrap();
        assert_eq!(p.metrics.effectiveness_score, 50.0);
    }

    #[test]
    fn test_out_of_range_rating_rejected_without_side_effects() {
        let mut p = prompt("a", 1.0);
        assert!(p.record_usage(Some(0), true).is_err());
        assert!(p.record_usage(Some(6), true).is_err());
        assert_eq!(p.metrics.use_count, 0);
    }

    #[test]
    fn test_render_with_defaults_and_adaptations() {
        let p = Prompt::new(
            "explain",
            "friendly",
            PromptContext::Explanation,
            "Tutor for {{ level }} learners.",
            "Explain {{topic}}. {{extra}}",
        )
        .with_variable(ContextVariable {
            name: "level".to_string(),
            source: VariableSource::UserProfile,
            required: false,
            default: Some("beginner".to_string()),
        })
        .with_variable(ContextVariable {
            name: "topic".to_string(),
            source: VariableSource::Content,
            required: true,
            default: None,
        })
        .with_variable(ContextVariable {
            name: "extra".to_string(),
            source: VariableSource::System,
            required: false,
            default: None,
        })
        .with_adaptation(PromptAdaptation {
            condition: AdaptiveCondition::new(Metric::FrustrationDetected, Operator::Eq, true),
            modification: "Be extra encouraging.".to_string(),
            priority: 1,
        })
        .with_adaptation(PromptAdaptation {
            condition: AdaptiveCondition::new(Metric::AverageScore, Operator::Lt, 50.0),
            modification: "Use simple examples.".to_string(),
            priority: 5,
        });

        let mut ctx = ContextSnapshot::new(9, Weekday::Mon);
        ctx.frustration_detected = true;
        ctx.average_score = 30.0;

        let mut values = HashMap::new();
        values.insert("topic".to_string(), "fractions".to_string());

        let rendered = p.render(&values, &ctx).unwrap();
        assert_eq!(
            rendered.system,
            "Tutor for beginner learners.\n\nUse simple examples.\n\nBe extra encouraging."
        );
        assert_eq!(rendered.user, "Explain fractions. ");
    }

    #[test]
    fn test_render_missing_required_fails() {
        let p = prompt("a", 1.0).with_variable(ContextVariable {
            name: "topic".to_string(),
            source: VariableSource::Content,
            required: true,
            default: None,
        });
        let ctx = ContextSnapshot::new(9, Weekday::Mon);
        let err = p.render(&HashMap::new(), &ctx).unwrap_err();
        assert!(matches!(err, TutorflowError::Template(_)));
    }

    #[test]
    fn test_render_undeclared_placeholder_fails() {
        let p = prompt("a", 1.0);
        let ctx = ContextSnapshot::new(9, Weekday::Mon);
        assert!(p.render(&HashMap::new(), &ctx).is_err());
    }

    #[test]
    fn test_select_no_candidate() {
        let prompts = vec![prompt("a", 1.0)];
        let mut rng = SeededRandom::new(1);
        let err = select_prompt(&prompts, "strict", PromptContext::Hint, true, &mut rng).unwrap_err();
        assert!(matches!(err, TutorflowError::NoEligibleCandidate(_)));
    }

    #[test]
    fn test_select_ab_zero_weights_never_win() {
        let prompts = vec![prompt("a", 0.0), prompt("b", 0.0), prompt("c", 5.0)];
        let mut rng = SeededRandom::new(3);
        for _ in 0..1000 {
            let chosen =
                select_prompt(&prompts, "socratic", PromptContext::Hint, true, &mut rng).unwrap();
            assert_eq!(chosen.name, "c");
        }
    }

    #[test]
    fn test_select_ab_all_zero_returns_first() {
        let prompts = vec![prompt("a", 0.0), prompt("b", 0.0)];
        let mut rng = FixedSequence::new(vec![0.9]);
        let chosen = select_prompt(&prompts, "socratic", PromptContext::Hint, true, &mut rng).unwrap();
        assert_eq!(chosen.name, "a");
    }

    #[test]
    fn test_select_without_ab_uses_ranking() {
        let mut weak = prompt("weak", 100.0);
        weak.metrics.effectiveness_score = 40.0;
        weak.metrics.average_rating = 5.0;
        let mut strong = prompt("strong", 0.0);
        strong.metrics.effectiveness_score = 90.0;
        let mut tie = prompt("tie-better-rating", 0.0);
        tie.metrics.effectiveness_score = 90.0;
        tie.metrics.average_rating = 4.5;

        let prompts = vec![weak, strong, tie];
        let mut rng = SeededRandom::new(9);
        let chosen = select_prompt(&prompts, "socratic", PromptContext::Hint, false, &mut rng).unwrap();
        assert_eq!(chosen.name, "tie-better-rating");
    }

    #[test]
    fn test_select_skips_inactive() {
        let mut inactive = prompt("off", 100.0);
        inactive.is_active = false;
        let prompts = vec![inactive, prompt("on", 1.0)];
        let mut rng = SeededRandom::new(2);
        let chosen = select_prompt(&prompts, "socratic", PromptContext::Hint, true, &mut rng).unwrap();
        assert_eq!(chosen.name, "on");
    }
}
