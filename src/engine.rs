//! Adaptation engine: the per-request entry point.
//!
//! Wires the pure evaluation code (selector, generator, prompt selection)
//! to an `EngineStore`. Every call reads what it needs, computes, and writes
//! the result back.

use crate::config::EngineConfig;
use crate::context::ContextSnapshot;
use crate::error::Result;
use crate::prompt::{self, Prompt, PromptContext, RenderedPrompt};
use crate::recommendation::{
    EffectivenessImpact, Recommendation, RecommendationGenerator, ResponseOutcome, UserResponse,
};
use crate::rules::{select_applicable, Rule};
use crate::scoring::{RandomSource, ThreadRandom};
use crate::storage::{EngineStore, RuleQuery};
use crate::types::{PromptId, RecommendationId, RuleId};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct AdaptationEngine<S: EngineStore> {
    store: Arc<S>,
    generator: RecommendationGenerator,
    ab_testing: bool,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl<S: EngineStore> AdaptationEngine<S> {
    pub fn new(store: Arc<S>, config: &EngineConfig) -> Self {
        Self {
            store,
            generator: RecommendationGenerator::with_default_catalogue(
                config.recommendations.clone(),
            ),
            ab_testing: config.selection.ab_testing_enabled,
            rng: Mutex::new(Box::new(ThreadRandom)),
        }
    }

    /// Replace the randomness used for A/B prompt selection
    pub fn with_random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn with_generator(mut self, generator: RecommendationGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate (clamping priority) and persist a new rule
    pub async fn add_rule(&self, mut rule: Rule) -> Result<Rule> {
        rule.prepare_for_write()?;
        self.store.create_rule(&rule).await?;
        info!("Added rule '{}' ({})", rule.name, rule.id);
        Ok(rule)
    }

    /// Validate and overwrite an existing rule
    pub async fn update_rule(&self, mut rule: Rule) -> Result<Rule> {
        rule.prepare_for_write()?;
        rule.updated_at = Utc::now();
        self.store.update_rule(&rule).await?;
        Ok(rule)
    }

    /// Rules that apply to the learner right now, highest priority first
    pub async fn evaluate_rules(&self, user_id: &str, context: &ContextSnapshot) -> Result<Vec<Rule>> {
        let candidates = self
            .store
            .list_rules(&RuleQuery::candidates_for(user_id))
            .await?;
        let selected = select_applicable(&candidates, context, user_id, Utc::now());
        debug!(
            "{} of {} candidate rules apply to {}",
            selected.len(),
            candidates.len(),
            user_id
        );
        Ok(selected)
    }

    pub async fn record_rule_outcome(&self, rule_id: &RuleId, was_successful: bool) -> Result<Rule> {
        self.store
            .record_rule_outcome(rule_id, was_successful, Utc::now())
            .await
    }

    /// Generate and persist recommendations for the learner
    pub async fn generate_recommendations(
        &self,
        user_id: &str,
        context: &ContextSnapshot,
    ) -> Result<Vec<Recommendation>> {
        let recommendations = self.generator.generate(user_id, context, Utc::now());
        for recommendation in &recommendations {
            self.store.create_recommendation(recommendation).await?;
        }
        Ok(recommendations)
    }

    pub async fn mark_viewed(&self, id: &RecommendationId) -> Result<Recommendation> {
        let mut recommendation = self.store.get_recommendation(id).await?;
        if recommendation.mark_as_viewed(Utc::now()) {
            self.store.update_recommendation(&recommendation).await?;
        }
        Ok(recommendation)
    }

    pub async fn respond(
        &self,
        id: &RecommendationId,
        response: UserResponse,
        feedback: Option<String>,
    ) -> Result<(Recommendation, ResponseOutcome)> {
        let mut recommendation = self.store.get_recommendation(id).await?;
        let outcome = recommendation.record_response(response, feedback, Utc::now());
        self.store.update_recommendation(&recommendation).await?;
        Ok((recommendation, outcome))
    }

    pub async fn record_recommendation_impact(
        &self,
        id: &RecommendationId,
        impact: EffectivenessImpact,
    ) -> Result<Recommendation> {
        let mut recommendation = self.store.get_recommendation(id).await?;
        recommendation.record_impact(impact);
        self.store.update_recommendation(&recommendation).await?;
        Ok(recommendation)
    }

    /// Expire up to `limit` overdue open recommendations
    pub async fn sweep_expired(&self, limit: usize) -> Result<usize> {
        self.store.expire_recommendations(Utc::now(), limit).await
    }

    pub async fn add_prompt(&self, prompt: Prompt) -> Result<Prompt> {
        prompt.validate()?;
        self.store.create_prompt(&prompt).await?;
        info!(
            "Added prompt '{}' for {}/{}",
            prompt.name, prompt.personality, prompt.context_type
        );
        Ok(prompt)
    }

    /// Prompt to use for a personality and context type
    pub async fn select_prompt(&self, personality: &str, context_type: PromptContext) -> Result<Prompt> {
        let candidates = self
            .store
            .list_prompts(Some(personality), Some(context_type))
            .await?;
        let mut rng = self.rng.lock().await;
        let chosen = prompt::select_prompt(
            &candidates,
            personality,
            context_type,
            self.ab_testing,
            rng.as_mut(),
        )?;
        Ok(chosen.clone())
    }

    pub async fn render_prompt(
        &self,
        id: &PromptId,
        values: &HashMap<String, String>,
        context: &ContextSnapshot,
    ) -> Result<RenderedPrompt> {
        let prompt = self.store.get_prompt(id).await?;
        prompt.render(values, context)
    }

    pub async fn record_prompt_usage(
        &self,
        id: &PromptId,
        rating: Option<u8>,
        successful: bool,
    ) -> Result<Prompt> {
        self.store.record_prompt_usage(id, rating, successful).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TutorflowError;
    use crate::recommendation::RecommendationStatus;
    use crate::rules::conditions::{ConditionSet, PerformanceConditions};
    use crate::rules::{RuleCategory, TriggerType};
    use crate::scoring::FixedSequence;
    use crate::storage::libsql::LibsqlStore;
    use chrono::Weekday;

    async fn engine() -> AdaptationEngine<LibsqlStore> {
        let store = Arc::new(LibsqlStore::new_in_memory().await.unwrap());
        AdaptationEngine::new(store, &EngineConfig::default())
    }

    fn low_completion_rule() -> Rule {
        Rule::new("low-completion", RuleCategory::Intervention, TriggerType::Trigger)
            .with_priority(9)
            .with_conditions(ConditionSet {
                performance: Some(PerformanceConditions {
                    max_completion_rate: Some(30.0),
                    ..Default::default()
                }),
                ..Default::default()
            })
    }

    #[tokio::test]
    async fn test_rule_selected_then_cooling_down() {
        let engine = engine().await;
        let rule = engine.add_rule(low_completion_rule()).await.unwrap();

        let mut ctx = ContextSnapshot::new(10, Weekday::Thu);
        ctx.completion_rate = 20.0;

        let selected = engine.evaluate_rules("u1", &ctx).await.unwrap();
        assert_eq!(selected.len(), 1);

        engine.record_rule_outcome(&rule.id, true).await.unwrap();
        assert!(engine.evaluate_rules("u1", &ctx).await.unwrap().is_empty());

        ctx.completion_rate = 40.0;
        assert!(engine.evaluate_rules("u2", &ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_rule_clamps_priority_and_rejects_bad_bounds() {
        let engine = engine().await;
        let rule = engine
            .add_rule(low_completion_rule().with_priority(42))
            .await
            .unwrap();
        assert_eq!(rule.configuration.priority, 10);

        let bad = Rule::new("bad", RuleCategory::Engagement, TriggerType::Trigger).with_conditions(
            ConditionSet {
                performance: Some(PerformanceConditions {
                    min_completion_rate: Some(50.0),
                    max_completion_rate: Some(50.0),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        assert!(matches!(
            engine.add_rule(bad).await,
            Err(TutorflowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_recommendation_flow() {
        let engine = engine().await;
        let mut ctx = ContextSnapshot::new(10, Weekday::Thu);
        ctx.average_score = 40.0;
        ctx.focus_score = 80.0;
        ctx.ai_effectiveness = 90.0;

        let generated = engine.generate_recommendations("u1", &ctx).await.unwrap();
        assert_eq!(generated.len(), 1);
        let id = generated[0].id;

        let viewed = engine.mark_viewed(&id).await.unwrap();
        assert_eq!(viewed.status(), RecommendationStatus::Viewed);

        let (answered, outcome) = engine
            .respond(&id, UserResponse::Later, None)
            .await
            .unwrap();
        assert_eq!(outcome, ResponseOutcome::Applied(RecommendationStatus::Dismissed));
        assert_eq!(answered.status(), RecommendationStatus::Dismissed);
        assert_eq!(engine.sweep_expired(100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recommendation_impact_is_persisted() {
        let engine = engine().await;
        let mut ctx = ContextSnapshot::new(10, Weekday::Thu);
        ctx.average_score = 40.0;
        ctx.focus_score = 80.0;
        ctx.ai_effectiveness = 90.0;
        let id = engine.generate_recommendations("u1", &ctx).await.unwrap()[0].id;

        let impact = EffectivenessImpact {
            completion_delta: Some(12.5),
            score_delta: Some(8.0),
            engagement_delta: None,
            measured_at: Utc::now(),
        };
        engine
            .record_recommendation_impact(&id, impact.clone())
            .await
            .unwrap();

        let stored = engine.store().get_recommendation(&id).await.unwrap();
        assert_eq!(stored.impact, Some(impact));
        assert_eq!(stored.status(), RecommendationStatus::Pending);

        let missing = engine
            .record_recommendation_impact(&RecommendationId::new(), stored.impact.clone().unwrap())
            .await;
        assert!(matches!(missing, Err(TutorflowError::RecommendationNotFound(_))));
    }

    #[tokio::test]
    async fn test_select_prompt_uses_injected_random() {
        let store = Arc::new(LibsqlStore::new_in_memory().await.unwrap());
        let engine = AdaptationEngine::new(store, &EngineConfig::default())
            .with_random(Box::new(FixedSequence::new(vec![0.9])));

        for (name, weight) in [("a", 1.0), ("b", 1.0)] {
            let p = Prompt::new(name, "socratic", PromptContext::Hint, "sys", "user")
                .with_test_weight(weight);
            engine.add_prompt(p).await.unwrap();
        }

        let chosen = engine
            .select_prompt("socratic", PromptContext::Hint)
            .await
            .unwrap();
        assert_eq!(chosen.name, "b");

        let missing = engine.select_prompt("strict", PromptContext::Hint).await;
        assert!(matches!(missing, Err(TutorflowError::NoEligibleCandidate(_))));
    }
}
