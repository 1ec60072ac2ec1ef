//! Learner context snapshots.
//!
//! A `ContextSnapshot` is the read-only view of a learner's current metrics
//! that every rule, recommendation template and prompt adaptation is
//! evaluated against. It is never persisted: callers rebuild it per
//! evaluation from analytics, progress and session records.

use crate::types::{ConditionValue, Difficulty, LearningStyle};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named metric a condition can inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CompletionRate,
    AverageScore,
    FocusScore,
    SessionCount,
    AiSatisfaction,
    AiEffectiveness,
    ConsecutiveFailures,
    DaysInactive,
    FrustrationDetected,
    Category,
    Difficulty,
    LearningStyle,
    HourOfDay,
    DayOfWeek,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::CompletionRate => "completion_rate",
            Metric::AverageScore => "average_score",
            Metric::FocusScore => "focus_score",
            Metric::SessionCount => "session_count",
            Metric::AiSatisfaction => "ai_satisfaction",
            Metric::AiEffectiveness => "ai_effectiveness",
            Metric::ConsecutiveFailures => "consecutive_failures",
            Metric::DaysInactive => "days_inactive",
            Metric::FrustrationDetected => "frustration_detected",
            Metric::Category => "category",
            Metric::Difficulty => "difficulty",
            Metric::LearningStyle => "learning_style",
            Metric::HourOfDay => "hour_of_day",
            Metric::DayOfWeek => "day_of_week",
        };
        write!(f, "{}", name)
    }
}

/// Metric lookup used by the condition engine
///
/// Anything that can answer metric queries can be evaluated against
/// rules, so module- and question-level adaptations share one engine
/// with learner-level rules.
pub trait MetricSource {
    /// Current value of a metric, `None` when the source cannot supply it
    fn metric(&self, metric: Metric) -> Option<ConditionValue>;

    /// Local hour (0..=23) of the evaluation instant
    fn local_hour(&self) -> Option<u32> {
        self.metric(Metric::HourOfDay)
            .and_then(|v| v.as_number())
            .map(|h| h as u32)
    }

    /// Local weekday of the evaluation instant
    fn weekday(&self) -> Option<Weekday>;
}

/// Lowercase English weekday name, as used in `day_of_week` conditions
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn current_hour() -> u32 {
    Local::now().hour()
}

fn current_weekday() -> Weekday {
    Local::now().weekday()
}

/// Snapshot of a learner's metrics at evaluation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Percentage of assigned content completed (0-100)
    #[serde(default)]
    pub completion_rate: f64,

    /// Average assessment score (0-100)
    #[serde(default)]
    pub average_score: f64,

    /// Focus score from engagement analytics (0-100)
    #[serde(default)]
    pub focus_score: f64,

    #[serde(default)]
    pub session_count: u32,

    /// Mean AI tutor satisfaction over recent sessions (0-100)
    #[serde(default)]
    pub ai_satisfaction: f64,

    /// Mean AI tutor effectiveness over recent sessions (0-100)
    #[serde(default)]
    pub ai_effectiveness: f64,

    #[serde(default)]
    pub consecutive_failures: u32,

    /// Whole days since the latest session started
    #[serde(default)]
    pub days_inactive: u32,

    #[serde(default)]
    pub frustration_detected: bool,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub difficulty: Option<Difficulty>,

    #[serde(default)]
    pub learning_style: Option<LearningStyle>,

    /// Local hour of the evaluation instant
    #[serde(default = "current_hour")]
    pub hour_of_day: u32,

    /// Local weekday of the evaluation instant
    #[serde(default = "current_weekday")]
    pub weekday: Weekday,
}

impl ContextSnapshot {
    /// Empty snapshot evaluated at the given local hour and weekday
    pub fn new(hour_of_day: u32, weekday: Weekday) -> Self {
        Self {
            completion_rate: 0.0,
            average_score: 0.0,
            focus_score: 0.0,
            session_count: 0,
            ai_satisfaction: 0.0,
            ai_effectiveness: 0.0,
            consecutive_failures: 0,
            days_inactive: 0,
            frustration_detected: false,
            category: None,
            difficulty: None,
            learning_style: None,
            hour_of_day,
            weekday,
        }
    }

    /// Empty snapshot evaluated at an instant in any time zone
    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Self::new(instant.hour(), instant.weekday())
    }
}

impl MetricSource for ContextSnapshot {
    fn metric(&self, metric: Metric) -> Option<ConditionValue> {
        let value = match metric {
            Metric::CompletionRate => ConditionValue::Number(self.completion_rate),
            Metric::AverageScore => ConditionValue::Number(self.average_score),
            Metric::FocusScore => ConditionValue::Number(self.focus_score),
            Metric::SessionCount => ConditionValue::from(self.session_count),
            Metric::AiSatisfaction => ConditionValue::Number(self.ai_satisfaction),
            Metric::AiEffectiveness => ConditionValue::Number(self.ai_effectiveness),
            Metric::ConsecutiveFailures => ConditionValue::from(self.consecutive_failures),
            Metric::DaysInactive => ConditionValue::from(self.days_inactive),
            Metric::FrustrationDetected => ConditionValue::Flag(self.frustration_detected),
            Metric::Category => ConditionValue::Text(self.category.clone()?),
            Metric::Difficulty => ConditionValue::Text(self.difficulty?.to_string()),
            Metric::LearningStyle => ConditionValue::Text(self.learning_style?.to_string()),
            Metric::HourOfDay => ConditionValue::from(self.hour_of_day),
            Metric::DayOfWeek => ConditionValue::from(weekday_name(self.weekday)),
        };
        Some(value)
    }

    fn local_hour(&self) -> Option<u32> {
        Some(self.hour_of_day)
    }

    fn weekday(&self) -> Option<Weekday> {
        Some(self.weekday)
    }
}

/// Aggregated learning analytics for a learner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerAnalytics {
    pub completion_rate: f64,
    pub average_score: Option<f64>,
    pub focus_score: f64,
}

/// Progress through the learner's current path or module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Most recent assessment scores (0-100)
    pub recent_scores: Vec<f64>,
    pub consecutive_failures: u32,
}

/// One AI tutoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub started_at: DateTime<Utc>,
    pub ai_satisfaction: Option<f64>,
    pub ai_effectiveness: Option<f64>,
    #[serde(default)]
    pub frustration_detected: bool,
}

/// Composes a `ContextSnapshot` from the learner's records
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshotBuilder {
    analytics: Option<LearnerAnalytics>,
    progress: Option<ProgressRecord>,
    sessions: Vec<SessionRecord>,
    learning_style: Option<LearningStyle>,
}

impl ContextSnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analytics(mut self, analytics: LearnerAnalytics) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn progress(mut self, progress: ProgressRecord) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn sessions(mut self, sessions: Vec<SessionRecord>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn learning_style(mut self, style: LearningStyle) -> Self {
        self.learning_style = Some(style);
        self
    }

    /// Build the snapshot as seen at `instant`
    ///
    /// Hour and weekday come from the instant's own time zone, so pass a
    /// `DateTime<Local>` (or the learner's zone) for timing conditions.
    pub fn build_at<Tz: TimeZone>(self, instant: &DateTime<Tz>) -> ContextSnapshot {
        let mut snapshot = ContextSnapshot::at(instant);
        let now_utc = instant.with_timezone(&Utc);

        let progress = self.progress.unwrap_or_default();
        let recent_mean = mean(progress.recent_scores.iter().copied());

        if let Some(analytics) = self.analytics {
            snapshot.completion_rate = analytics.completion_rate;
            snapshot.focus_score = analytics.focus_score;
            snapshot.average_score = analytics.average_score.or(recent_mean).unwrap_or(0.0);
        } else {
            snapshot.average_score = recent_mean.unwrap_or(0.0);
        }

        snapshot.category = progress.category;
        snapshot.difficulty = progress.difficulty;
        snapshot.consecutive_failures = progress.consecutive_failures;
        snapshot.learning_style = self.learning_style;

        snapshot.session_count = self.sessions.len() as u32;
        snapshot.ai_satisfaction =
            mean(self.sessions.iter().filter_map(|s| s.ai_satisfaction)).unwrap_or(0.0);
        snapshot.ai_effectiveness =
            mean(self.sessions.iter().filter_map(|s| s.ai_effectiveness)).unwrap_or(0.0);

        if let Some(latest) = self.sessions.iter().max_by_key(|s| s.started_at) {
            snapshot.frustration_detected = latest.frustration_detected;
            let days = now_utc.signed_duration_since(latest.started_at).num_days();
            snapshot.days_inactive = days.max(0) as u32;
        }

        snapshot
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn session(days_ago: i64, now: DateTime<Utc>, sat: Option<f64>, eff: Option<f64>) -> SessionRecord {
        SessionRecord {
            started_at: now - Duration::days(days_ago),
            ai_satisfaction: sat,
            ai_effectiveness: eff,
            frustration_detected: false,
        }
    }

    #[test]
    fn test_build_from_all_sources() {
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 14, 30, 0).unwrap();
        let snapshot = ContextSnapshotBuilder::new()
            .analytics(LearnerAnalytics {
                completion_rate: 42.0,
                average_score: Some(71.0),
                focus_score: 55.0,
            })
            .progress(ProgressRecord {
                category: Some("programming".to_string()),
                difficulty: Some(Difficulty::Intermediate),
                recent_scores: vec![10.0, 20.0],
                consecutive_failures: 2,
            })
            .sessions(vec![
                session(3, now, Some(80.0), Some(60.0)),
                session(1, now, None, Some(70.0)),
            ])
            .learning_style(LearningStyle::Visual)
            .build_at(&now);

        assert_eq!(snapshot.completion_rate, 42.0);
        assert_eq!(snapshot.average_score, 71.0);
        assert_eq!(snapshot.focus_score, 55.0);
        assert_eq!(snapshot.session_count, 2);
        assert_eq!(snapshot.ai_satisfaction, 80.0);
        assert_eq!(snapshot.ai_effectiveness, 65.0);
        assert_eq!(snapshot.days_inactive, 1);
        assert_eq!(snapshot.consecutive_failures, 2);
        assert_eq!(snapshot.category.as_deref(), Some("programming"));
        assert_eq!(snapshot.learning_style, Some(LearningStyle::Visual));
        assert_eq!(snapshot.hour_of_day, 14);
        assert_eq!(snapshot.weekday, Weekday::Wed);
    }

    #[test]
    fn test_average_score_falls_back_to_recent_scores() {
        let now = Utc::now();
        let snapshot = ContextSnapshotBuilder::new()
            .progress(ProgressRecord {
                recent_scores: vec![50.0, 70.0, 90.0],
                ..Default::default()
            })
            .build_at(&now);
        assert_eq!(snapshot.average_score, 70.0);
        assert_eq!(snapshot.session_count, 0);
        assert_eq!(snapshot.ai_satisfaction, 0.0);
        assert_eq!(snapshot.days_inactive, 0);
    }

    #[test]
    fn test_local_time_follows_instant_zone() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap(); // Sunday
        let tokyo = utc.with_timezone(&FixedOffset::east_opt(9 * 3600).unwrap());
        let snapshot = ContextSnapshotBuilder::new().build_at(&tokyo);
        assert_eq!(snapshot.hour_of_day, 8);
        assert_eq!(snapshot.weekday, Weekday::Mon);
    }

    #[test]
    fn test_frustration_comes_from_latest_session() {
        let now = Utc::now();
        let mut old = session(5, now, None, None);
        old.frustration_detected = true;
        let recent = session(0, now, None, None);
        let snapshot = ContextSnapshotBuilder::new()
            .sessions(vec![old, recent])
            .build_at(&now);
        assert!(!snapshot.frustration_detected);
    }

    #[test]
    fn test_metric_lookup() {
        let mut snapshot = ContextSnapshot::new(9, Weekday::Fri);
        snapshot.difficulty = Some(Difficulty::Advanced);
        assert_eq!(
            snapshot.metric(Metric::Difficulty),
            Some(ConditionValue::Text("advanced".into()))
        );
        assert_eq!(snapshot.metric(Metric::Category), None);
        assert_eq!(
            snapshot.metric(Metric::DayOfWeek),
            Some(ConditionValue::Text("friday".into()))
        );
        assert_eq!(snapshot.local_hour(), Some(9));
    }

    #[test]
    fn test_snapshot_deserializes_with_defaults() {
        let snapshot: ContextSnapshot =
            serde_json::from_str(r#"{"completion_rate": 20, "hour_of_day": 8, "weekday": "Tue"}"#)
                .unwrap();
        assert_eq!(snapshot.completion_rate, 20.0);
        assert_eq!(snapshot.weekday, Weekday::Tue);
        assert_eq!(snapshot.session_count, 0);
    }
}
