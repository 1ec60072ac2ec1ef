//! Core data types shared across the adaptation engine
//!
//! Identifiers, learner vocabularies (difficulty, learning style) and the
//! tagged `ConditionValue` used wherever a rule compares a context metric
//! against a threshold.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an ID from a string
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for adaptation rules
    RuleId
);
define_id!(
    /// Unique identifier for recommendations
    RecommendationId
);
define_id!(
    /// Unique identifier for AI prompt templates
    PromptId
);

/// Content difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
            Difficulty::Expert => write!(f, "expert"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("Unknown difficulty: {}", other)),
        }
    }
}

/// Learner's preferred learning style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    ReadingWriting,
    Mixed,
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningStyle::Visual => write!(f, "visual"),
            LearningStyle::Auditory => write!(f, "auditory"),
            LearningStyle::Kinesthetic => write!(f, "kinesthetic"),
            LearningStyle::ReadingWriting => write!(f, "reading_writing"),
            LearningStyle::Mixed => write!(f, "mixed"),
        }
    }
}

impl FromStr for LearningStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visual" => Ok(LearningStyle::Visual),
            "auditory" => Ok(LearningStyle::Auditory),
            "kinesthetic" => Ok(LearningStyle::Kinesthetic),
            "reading_writing" => Ok(LearningStyle::ReadingWriting),
            "mixed" => Ok(LearningStyle::Mixed),
            other => Err(format!("Unknown learning style: {}", other)),
        }
    }
}

/// Threshold or metric value used by adaptive conditions
///
/// Serialized untagged so stored thresholds read naturally as JSON
/// (`30`, `"visual"`, `true`, `["a", "b"]`). Comparisons never coerce
/// between variants: a number is never equal to its string spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<ConditionValue>),
}

impl ConditionValue {
    /// Numeric view, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Strict equality: same variant and same value
    pub fn same_as(&self, other: &ConditionValue) -> bool {
        match (self, other) {
            (ConditionValue::Number(a), ConditionValue::Number(b)) => a == b,
            (ConditionValue::Text(a), ConditionValue::Text(b)) => a == b,
            (ConditionValue::Flag(a), ConditionValue::Flag(b)) => a == b,
            (ConditionValue::List(a), ConditionValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            _ => false,
        }
    }

    /// Membership test: `self` is contained in `list`
    ///
    /// Returns false when `list` is not a list.
    pub fn is_member_of(&self, list: &ConditionValue) -> bool {
        match list {
            ConditionValue::List(items) => items.iter().any(|item| item.same_as(self)),
            _ => false,
        }
    }
}

impl From<f64> for ConditionValue {
    fn from(n: f64) -> Self {
        ConditionValue::Number(n)
    }
}

impl From<u32> for ConditionValue {
    fn from(n: u32) -> Self {
        ConditionValue::Number(n as f64)
    }
}

impl From<bool> for ConditionValue {
    fn from(b: bool) -> Self {
        ConditionValue::Flag(b)
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        ConditionValue::Text(s.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        ConditionValue::Text(s)
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Flag(b) => write!(f, "{}", b),
            ConditionValue::Number(n) => write!(f, "{}", n),
            ConditionValue::Text(s) => write!(f, "{}", s),
            ConditionValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}
