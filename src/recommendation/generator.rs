//! Rule-based recommendation generation.
//!
//! Each template carries a `ConditionSet` evaluated against the learner's
//! context with the shared condition engine. Matching templates become
//! recommendations whose confidence grows with the number of observed
//! sessions.

use crate::config::RecommendationSettings;
use crate::context::ContextSnapshot;
use crate::rules::conditions::{
    matches, AiInteractionConditions, ConditionSet, EngagementConditions, PerformanceConditions,
};
use crate::recommendation::{
    GenerationMeta, Recommendation, RecommendationKind, RecommendationScores, SuggestedTiming,
    Target,
};
use crate::scoring::confidence_from_samples;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Blueprint for one kind of recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationTemplate {
    pub kind: RecommendationKind,
    pub category: String,
    pub title: String,
    pub reason: String,
    #[serde(default)]
    pub conditions: ConditionSet,
    pub relevance: u8,
    pub priority: u8,
    pub timing: SuggestedTiming,
}

impl RecommendationTemplate {
    /// Built-in catalogue
    pub fn default_catalogue() -> Vec<RecommendationTemplate> {
        vec![
            RecommendationTemplate {
                kind: RecommendationKind::ReviewContent,
                category: "performance".to_string(),
                title: "Review recent material".to_string(),
                reason: "Recent assessment scores are below 60%".to_string(),
                conditions: ConditionSet {
                    performance: Some(PerformanceConditions {
                        max_average_score: Some(60.0),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                relevance: 90,
                priority: 85,
                timing: SuggestedTiming::NextSession,
            },
            RecommendationTemplate {
                kind: RecommendationKind::NextModule,
                category: "progression".to_string(),
                title: "Move on to the next module".to_string(),
                reason: "Completion and scores are both high".to_string(),
                conditions: ConditionSet {
                    performance: Some(PerformanceConditions {
                        min_completion_rate: Some(80.0),
                        min_average_score: Some(85.0),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                relevance: 80,
                priority: 70,
                timing: SuggestedTiming::ThisWeek,
            },
            RecommendationTemplate {
                kind: RecommendationKind::BreakSuggestion,
                category: "engagement".to_string(),
                title: "Take a short break".to_string(),
                reason: "Focus has dropped during recent sessions".to_string(),
                conditions: ConditionSet {
                    engagement: Some(EngagementConditions {
                        max_focus_score: Some(40.0),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                relevance: 70,
                priority: 90,
                timing: SuggestedTiming::Immediate,
            },
            RecommendationTemplate {
                kind: RecommendationKind::AiTutorSession,
                category: "ai_support".to_string(),
                title: "Try a guided tutoring session".to_string(),
                reason: "AI assistance has not been effective lately".to_string(),
                conditions: ConditionSet {
                    ai_interaction: Some(AiInteractionConditions {
                        max_effectiveness_score: Some(50.0),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                relevance: 75,
                priority: 60,
                timing: SuggestedTiming::WhenReady,
            },
        ]
    }
}

/// Produces ranked recommendations from templates
#[derive(Debug, Clone)]
pub struct RecommendationGenerator {
    templates: Vec<RecommendationTemplate>,
    settings: RecommendationSettings,
}

impl RecommendationGenerator {
    pub fn new(templates: Vec<RecommendationTemplate>, settings: RecommendationSettings) -> Self {
        Self {
            templates,
            settings,
        }
    }

    pub fn with_default_catalogue(settings: RecommendationSettings) -> Self {
        Self::new(RecommendationTemplate::default_catalogue(), settings)
    }

    pub fn templates(&self) -> &[RecommendationTemplate] {
        &self.templates
    }

    /// Matching recommendations, highest overall score first, at most
    /// `max_per_run`
    pub fn generate(
        &self,
        user_id: &str,
        context: &ContextSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let confidence = confidence_from_samples(context.session_count);
        let generation = GenerationMeta {
            algorithm: self.settings.algorithm.clone(),
            version: self.settings.version.clone(),
        };

        let mut generated: Vec<Recommendation> = Vec::new();
        for template in &self.templates {
            if !matches(&template.conditions, context) {
                debug!("Template '{}' does not match for {}", template.title, user_id);
                continue;
            }

            let scores = RecommendationScores::new(template.relevance, confidence, template.priority);
            let recommendation = match Recommendation::new(
                user_id,
                template.kind,
                template.title.clone(),
                scores,
                template.timing,
                now,
            ) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Skipping template '{}': {}", template.title, e);
                    continue;
                }
            };

            generated.push(
                recommendation
                    .with_category(template.category.clone())
                    .with_reason(template.reason.clone())
                    .with_target(Target {
                        difficulty: context.difficulty,
                        ..Default::default()
                    })
                    .with_generation(generation.clone()),
            );
        }

        generated.sort_by(|a, b| b.overall_score().cmp(&a.overall_score()));
        generated.truncate(self.settings.max_per_run);

        info!(
            "Generated {} recommendations for {} ({} templates)",
            generated.len(),
            user_id,
            self.templates.len()
        );
        generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn settings(max_per_run: usize) -> RecommendationSettings {
        RecommendationSettings {
            max_per_run,
            ..Default::default()
        }
    }

    fn struggling_context() -> ContextSnapshot {
        let mut ctx = ContextSnapshot::new(10, Weekday::Tue);
        ctx.completion_rate = 30.0;
        ctx.average_score = 45.0;
        ctx.focus_score = 35.0;
        ctx.ai_effectiveness = 80.0;
        ctx.session_count = 10;
        ctx
    }

    #[test]
    fn test_generates_matching_ranked() {
        let generator = RecommendationGenerator::with_default_catalogue(settings(5));
        let recs = generator.generate("learner-1", &struggling_context(), Utc::now());

        let kinds: Vec<RecommendationKind> = recs.iter().map(|r| r.kind).collect();
        // review: 90/50/85 → 77, break: 70/50/90 → 70
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::ReviewContent,
                RecommendationKind::BreakSuggestion
            ]
        );
        assert_eq!(recs[0].overall_score(), 77);
        assert_eq!(recs[0].scores.confidence, 50);
        assert_eq!(recs[0].generation.algorithm, "rule_based");
        assert!(recs.iter().all(|r| r.user_id == "learner-1"));
    }

    #[test]
    fn test_truncates_to_max_per_run() {
        let generator = RecommendationGenerator::with_default_catalogue(settings(1));
        let recs = generator.generate("learner-1", &struggling_context(), Utc::now());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::ReviewContent);
    }

    #[test]
    fn test_nothing_matches_for_steady_learner() {
        let mut ctx = ContextSnapshot::new(10, Weekday::Tue);
        ctx.completion_rate = 60.0;
        ctx.average_score = 75.0;
        ctx.focus_score = 70.0;
        ctx.ai_effectiveness = 80.0;

        let generator = RecommendationGenerator::with_default_catalogue(settings(5));
        assert!(generator.generate("learner-2", &ctx, Utc::now()).is_empty());
    }

    #[test]
    fn test_invalid_template_is_skipped() {
        let bad = RecommendationTemplate {
            kind: RecommendationKind::SkillGap,
            category: "skills".to_string(),
            title: "Broken".to_string(),
            reason: String::new(),
            conditions: ConditionSet::default(),
            relevance: 150,
            priority: 50,
            timing: SuggestedTiming::ThisWeek,
        };
        let generator = RecommendationGenerator::new(vec![bad], settings(5));
        let ctx = ContextSnapshot::new(10, Weekday::Tue);
        assert!(generator.generate("u", &ctx, Utc::now()).is_empty());
    }
}
