//! Learner recommendations and their lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! pending ──view──▶ viewed ──respond──▶ accepted | declined | dismissed
//!    │                 │
//!    └──── sweep ──────┴──▶ expired   (terminal)
//! ```
//!
//! The overall score is always derived from the three sub-scores, never
//! stored independently on the model.

pub mod generator;

pub use generator::{RecommendationGenerator, RecommendationTemplate};

use crate::error::{Result, TutorflowError};
use crate::scoring::overall_score;
use crate::types::{Difficulty, RecommendationId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What a recommendation suggests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    NextModule,
    ReviewContent,
    PracticeExercise,
    LearningPath,
    StudySchedule,
    SkillGap,
    DifficultyAdjustment,
    BreakSuggestion,
    AiTutorSession,
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecommendationKind::NextModule => "next_module",
            RecommendationKind::ReviewContent => "review_content",
            RecommendationKind::PracticeExercise => "practice_exercise",
            RecommendationKind::LearningPath => "learning_path",
            RecommendationKind::StudySchedule => "study_schedule",
            RecommendationKind::SkillGap => "skill_gap",
            RecommendationKind::DifficultyAdjustment => "difficulty_adjustment",
            RecommendationKind::BreakSuggestion => "break_suggestion",
            RecommendationKind::AiTutorSession => "ai_tutor_session",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RecommendationKind {
    type Err = TutorflowError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| TutorflowError::Validation(format!("Unknown recommendation kind: {}", s)))
    }
}

/// Interaction state of a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Viewed,
    Accepted,
    Declined,
    Dismissed,
    Expired,
}

impl RecommendationStatus {
    /// Still waiting on the learner (and therefore able to expire)
    pub fn is_open(&self) -> bool {
        matches!(self, RecommendationStatus::Pending | RecommendationStatus::Viewed)
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Viewed => "viewed",
            RecommendationStatus::Accepted => "accepted",
            RecommendationStatus::Declined => "declined",
            RecommendationStatus::Dismissed => "dismissed",
            RecommendationStatus::Expired => "expired",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RecommendationStatus {
    type Err = TutorflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RecommendationStatus::Pending),
            "viewed" => Ok(RecommendationStatus::Viewed),
            "accepted" => Ok(RecommendationStatus::Accepted),
            "declined" => Ok(RecommendationStatus::Declined),
            "dismissed" => Ok(RecommendationStatus::Dismissed),
            "expired" => Ok(RecommendationStatus::Expired),
            other => Err(TutorflowError::Validation(format!(
                "Unknown recommendation status: {}",
                other
            ))),
        }
    }
}

/// Learner's answer to a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserResponse {
    Accepted,
    Declined,
    NotInterested,
    Later,
    AlreadyKnown,
    #[serde(other)]
    Other,
}

impl UserResponse {
    /// Status a response moves the recommendation to
    pub fn resulting_status(&self) -> RecommendationStatus {
        match self {
            UserResponse::Accepted => RecommendationStatus::Accepted,
            UserResponse::Declined | UserResponse::NotInterested => RecommendationStatus::Declined,
            _ => RecommendationStatus::Dismissed,
        }
    }
}

impl FromStr for UserResponse {
    type Err = TutorflowError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::String(s.to_string()))?)
    }
}

/// When the learner should act on a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedTiming {
    Immediate,
    NextSession,
    ThisWeek,
    WhenReady,
}

impl SuggestedTiming {
    /// How long a recommendation with this timing stays valid
    pub fn validity(&self) -> Duration {
        match self {
            SuggestedTiming::Immediate => Duration::days(1),
            SuggestedTiming::NextSession => Duration::days(3),
            SuggestedTiming::ThisWeek => Duration::days(7),
            SuggestedTiming::WhenReady => Duration::days(30),
        }
    }
}

/// Kind of content a recommendation points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    LearningPath,
    LearningModule,
    Assessment,
    Question,
    External,
}

/// Reference to a piece of content by id and kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub id: String,
    pub kind: ContentKind,
}

/// What the recommendation targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub content: Option<ContentRef>,
    pub skills: Vec<String>,
    pub difficulty: Option<Difficulty>,
}

/// Which algorithm produced a recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMeta {
    pub algorithm: String,
    pub version: String,
}

impl Default for GenerationMeta {
    fn default() -> Self {
        Self {
            algorithm: "rule_based".to_string(),
            version: "1.0".to_string(),
        }
    }
}

/// Relevance, confidence and priority, each 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationScores {
    pub relevance: u8,
    pub confidence: u8,
    pub priority: u8,
}

impl RecommendationScores {
    pub fn new(relevance: u8, confidence: u8, priority: u8) -> Self {
        Self {
            relevance,
            confidence,
            priority,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("relevance", self.relevance),
            ("confidence", self.confidence),
            ("priority", self.priority),
        ] {
            if value > 100 {
                return Err(TutorflowError::Validation(format!(
                    "{} score must be within 0..=100 (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn overall(&self) -> u8 {
        overall_score(self.relevance, self.confidence, self.priority)
    }
}

/// Learner interaction state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInteraction {
    pub status: RecommendationStatus,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response: Option<UserResponse>,
    #[serde(default)]
    pub feedback: Option<String>,
    /// A response arrived after the recommendation had expired
    #[serde(default)]
    pub stale_response: bool,
}

impl Default for UserInteraction {
    fn default() -> Self {
        Self {
            status: RecommendationStatus::Pending,
            viewed_at: None,
            responded_at: None,
            response: None,
            feedback: None,
            stale_response: false,
        }
    }
}

/// Measured effect of acting on a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessImpact {
    pub completion_delta: Option<f64>,
    pub score_delta: Option<f64>,
    pub engagement_delta: Option<f64>,
    pub measured_at: DateTime<Utc>,
}

/// Result of `record_response`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The response moved the recommendation to this status
    Applied(RecommendationStatus),
    /// The recommendation had already expired; the response was stored but
    /// the status stays `expired`
    Stale,
}

/// A recommendation owned by exactly one learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub user_id: String,
    pub kind: RecommendationKind,
    #[serde(default)]
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub reason: String,
    pub scores: RecommendationScores,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub generation: GenerationMeta,
    pub suggested_timing: SuggestedTiming,
    pub generated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub interaction: UserInteraction,
    #[serde(default)]
    pub impact: Option<EffectivenessImpact>,
}

impl Recommendation {
    /// New pending recommendation valid for the timing's window
    pub fn new(
        user_id: impl Into<String>,
        kind: RecommendationKind,
        title: impl Into<String>,
        scores: RecommendationScores,
        timing: SuggestedTiming,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        scores.validate()?;
        Ok(Self {
            id: RecommendationId::new(),
            user_id: user_id.into(),
            kind,
            category: String::new(),
            title: title.into(),
            reason: String::new(),
            scores,
            target: Target::default(),
            generation: GenerationMeta::default(),
            suggested_timing: timing,
            generated_at: now,
            valid_until: now + timing.validity(),
            interaction: UserInteraction::default(),
            impact: None,
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn with_generation(mut self, generation: GenerationMeta) -> Self {
        self.generation = generation;
        self
    }

    /// Explicit expiry; overrides the timing-derived default
    pub fn with_valid_until(mut self, valid_until: DateTime<Utc>) -> Self {
        self.valid_until = valid_until;
        self
    }

    pub fn overall_score(&self) -> u8 {
        self.scores.overall()
    }

    pub fn status(&self) -> RecommendationStatus {
        self.interaction.status
    }

    /// Replace the sub-scores; the overall score follows
    pub fn set_scores(&mut self, scores: RecommendationScores) -> Result<()> {
        scores.validate()?;
        self.scores = scores;
        Ok(())
    }

    /// pending → viewed; any other state is left untouched
    pub fn mark_as_viewed(&mut self, now: DateTime<Utc>) -> bool {
        if self.interaction.status != RecommendationStatus::Pending {
            return false;
        }
        self.interaction.status = RecommendationStatus::Viewed;
        self.interaction.viewed_at = Some(now);
        debug!("Recommendation {} viewed", self.id);
        true
    }

    /// Store a learner response and move to the mapped status
    ///
    /// Responses to an expired recommendation are kept (feedback included)
    /// and flagged as stale, but the status stays `expired`.
    pub fn record_response(
        &mut self,
        response: UserResponse,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> ResponseOutcome {
        self.interaction.response = Some(response);
        self.interaction.feedback = feedback;
        self.interaction.responded_at = Some(now);

        if self.interaction.status == RecommendationStatus::Expired {
            self.interaction.stale_response = true;
            warn!(
                "Stale response {:?} to expired recommendation {} (user {})",
                response, self.id, self.user_id
            );
            return ResponseOutcome::Stale;
        }

        let status = response.resulting_status();
        self.interaction.status = status;
        info!("Recommendation {} → {}", self.id, status);
        ResponseOutcome::Applied(status)
    }

    /// Expire if still open and past `valid_until`
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.interaction.status.is_open() && self.valid_until < now {
            self.interaction.status = RecommendationStatus::Expired;
            true
        } else {
            false
        }
    }

    pub fn record_impact(&mut self, impact: EffectivenessImpact) {
        self.impact = Some(impact);
    }
}

/// Expire every open, overdue recommendation; returns how many changed
pub fn sweep_expired(recommendations: &mut [Recommendation], now: DateTime<Utc>) -> usize {
    let expired = recommendations
        .iter_mut()
        .map(|r| r.expire_if_due(now))
        .filter(|changed| *changed)
        .count();
    if expired > 0 {
        info!("Expired {} recommendations", expired);
    }
    expired
}
