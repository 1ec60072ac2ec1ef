//! Adaptation rule model.

use crate::error::{Result, TutorflowError};
use crate::rules::conditions::ConditionSet;
use crate::types::{Difficulty, LearningStyle, RuleId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_COOLDOWN_HOURS: u32 = 24;

/// Adaptation domain a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    ContentDifficulty,
    LearningPace,
    TeachingStyle,
    AiPersonality,
    Intervention,
    Engagement,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::ContentDifficulty => write!(f, "content_difficulty"),
            RuleCategory::LearningPace => write!(f, "learning_pace"),
            RuleCategory::TeachingStyle => write!(f, "teaching_style"),
            RuleCategory::AiPersonality => write!(f, "ai_personality"),
            RuleCategory::Intervention => write!(f, "intervention"),
            RuleCategory::Engagement => write!(f, "engagement"),
        }
    }
}

impl FromStr for RuleCategory {
    type Err = TutorflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "content_difficulty" => Ok(RuleCategory::ContentDifficulty),
            "learning_pace" => Ok(RuleCategory::LearningPace),
            "teaching_style" => Ok(RuleCategory::TeachingStyle),
            "ai_personality" => Ok(RuleCategory::AiPersonality),
            "intervention" => Ok(RuleCategory::Intervention),
            "engagement" => Ok(RuleCategory::Engagement),
            other => Err(TutorflowError::Validation(format!(
                "Unknown rule category: {}",
                other
            ))),
        }
    }
}

/// How a rule gets evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Evaluated when a learner action fires an evaluation
    Trigger,
    /// Evaluated on every evaluation pass
    Continuous,
    /// Evaluated by scheduled batch jobs
    Scheduled,
    /// Applied by an administrator; usually carries no conditions
    Manual,
}

/// Direction of a content difficulty change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyChange {
    Increase,
    Decrease,
    Maintain,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentActions {
    pub difficulty_change: Option<DifficultyChange>,
    pub suggest_review: bool,
    pub skip_optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityActions {
    /// Name of the tutor personality to switch to
    pub switch_to: Option<String>,
    pub tone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingActions {
    pub session_length_minutes: Option<u32>,
    pub break_frequency_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionActions {
    pub notify_instructor: bool,
    pub send_encouragement: bool,
    pub schedule_check_in: bool,
    pub message: Option<String>,
}

/// Declarative adaptations applied when a rule fires
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentActions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_personality: Option<PersonalityActions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingActions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention: Option<InterventionActions>,
}

/// Outcome counters of a rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Effectiveness {
    pub total_triggers: u64,
    pub successful_adaptations: u64,
}

impl Effectiveness {
    /// Percentage of triggers that led to a successful adaptation
    pub fn success_rate(&self) -> f64 {
        if self.total_triggers == 0 {
            0.0
        } else {
            self.successful_adaptations as f64 / self.total_triggers as f64 * 100.0
        }
    }
}

/// Rule tuning and effectiveness statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfiguration {
    /// 1 (lowest) to 10 (highest); any integer is accepted on input and clamped
    #[serde(deserialize_with = "clamped_priority")]
    pub priority: u8,
    pub cooldown_period_hours: u32,
    /// Stored for administrators; not enforced by selection
    #[serde(default)]
    pub max_triggers_per_user: Option<u32>,
    #[serde(default)]
    pub effectiveness: Effectiveness,
}

fn clamped_priority<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    let clamped = raw.clamp(MIN_PRIORITY as i64, MAX_PRIORITY as i64) as u8;
    if raw != clamped as i64 {
        warn!("Rule priority {} clamped to {}", raw, clamped);
    }
    Ok(clamped)
}

impl Default for RuleConfiguration {
    fn default() -> Self {
        Self {
            priority: 5,
            cooldown_period_hours: DEFAULT_COOLDOWN_HOURS,
            max_triggers_per_user: None,
            effectiveness: Effectiveness::default(),
        }
    }
}

/// Who a rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RuleScope {
    Global,
    Targeted { user_ids: Vec<String> },
}

impl RuleScope {
    pub fn includes(&self, user_id: &str) -> bool {
        match self {
            RuleScope::Global => true,
            RuleScope::Targeted { user_ids } => user_ids.iter().any(|u| u == user_id),
        }
    }
}

/// Allow-lists restricting where a rule applies; empty means unrestricted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Applicability {
    pub categories: Vec<String>,
    pub difficulties: Vec<Difficulty>,
    pub learning_styles: Vec<LearningStyle>,
}

impl Applicability {
    pub fn allows(
        &self,
        category: Option<&str>,
        difficulty: Option<Difficulty>,
        learning_style: Option<LearningStyle>,
    ) -> bool {
        allowed(&self.categories, category.map(str::to_string))
            && allowed(&self.difficulties, difficulty)
            && allowed(&self.learning_styles, learning_style)
    }
}

fn allowed<T: PartialEq>(list: &[T], value: Option<T>) -> bool {
    list.is_empty() || value.is_some_and(|v| list.contains(&v))
}

/// A named, prioritized trigger-condition → adaptation-action mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: RuleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: RuleCategory,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub conditions: ConditionSet,
    #[serde(default)]
    pub actions: ActionSet,
    #[serde(default)]
    pub configuration: RuleConfiguration,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_scope")]
    pub scope: RuleScope,
    #[serde(default)]
    pub applicability: Applicability,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_scope() -> RuleScope {
    RuleScope::Global
}

impl Rule {
    /// New active, global rule with default configuration
    pub fn new(name: impl Into<String>, category: RuleCategory, trigger_type: TriggerType) -> Self {
        let now = Utc::now();
        Self {
            id: RuleId::new(),
            name: name.into(),
            description: String::new(),
            category,
            trigger_type,
            conditions: ConditionSet::default(),
            actions: ActionSet::default(),
            configuration: RuleConfiguration::default(),
            is_active: true,
            scope: RuleScope::Global,
            applicability: Applicability::default(),
            last_triggered: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.configuration.priority = priority;
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_actions(mut self, actions: ActionSet) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_cooldown_hours(mut self, hours: u32) -> Self {
        self.configuration.cooldown_period_hours = hours;
        self
    }

    pub fn targeted(mut self, user_ids: Vec<String>) -> Self {
        self.scope = RuleScope::Targeted { user_ids };
        self
    }

    /// Normalize and validate before persisting
    ///
    /// Priority outside 1..=10 is clamped; malformed conditions and empty
    /// names are rejected.
    pub fn prepare_for_write(&mut self) -> Result<()> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(TutorflowError::Validation(
                "Rule name cannot be empty".to_string(),
            ));
        }

        let clamped = self.configuration.priority.clamp(MIN_PRIORITY, MAX_PRIORITY);
        if clamped != self.configuration.priority {
            warn!(
                "Rule '{}' priority {} clamped to {}",
                self.name, self.configuration.priority, clamped
            );
            self.configuration.priority = clamped;
        }

        self.conditions.validate().map_err(|e| {
            TutorflowError::Validation(format!("Rule '{}': {}", self.name, e))
        })?;

        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether the rule fired too recently to fire again
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered {
            Some(last) => {
                let cooldown = Duration::hours(self.configuration.cooldown_period_hours as i64);
                now.signed_duration_since(last) < cooldown
            }
            None => false,
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.configuration.effectiveness.success_rate()
    }
}
