//! Prompt selection, rendering and usage metrics through the engine

use chrono::Weekday;
use std::collections::HashMap;
use std::sync::Arc;
use tutorflow_core::prompt::{ContextVariable, PromptAdaptation, VariableSource};
use tutorflow_core::rules::{AdaptiveCondition, Operator};
use tutorflow_core::scoring::SeededRandom;
use tutorflow_core::{
    AdaptationEngine, ContextSnapshot, EngineConfig, EngineStore, LibsqlStore, Metric, Prompt,
    PromptContext, TutorflowError,
};

async fn engine_with(ab_testing: bool, seed: u64) -> AdaptationEngine<LibsqlStore> {
    let store = Arc::new(LibsqlStore::new_in_memory().await.unwrap());
    let mut config = EngineConfig::default();
    config.selection.ab_testing_enabled = ab_testing;
    AdaptationEngine::new(store, &config).with_random(Box::new(SeededRandom::new(seed)))
}

fn explanation(name: &str, weight: f64) -> Prompt {
    Prompt::new(
        name,
        "encouraging",
        PromptContext::Explanation,
        "You are a patient tutor for {{subject}}.",
        "Explain {{topic}} to {{learner}}.",
    )
    .with_test_weight(weight)
    .with_variable(ContextVariable {
        name: "subject".to_string(),
        source: VariableSource::Content,
        required: true,
        default: None,
    })
    .with_variable(ContextVariable {
        name: "topic".to_string(),
        source: VariableSource::Content,
        required: true,
        default: None,
    })
    .with_variable(ContextVariable {
        name: "learner".to_string(),
        source: VariableSource::UserProfile,
        required: false,
        default: Some("the student".to_string()),
    })
}

#[tokio::test]
async fn test_ab_selection_follows_weights() {
    let engine = engine_with(true, 7).await;
    engine.add_prompt(explanation("heavy", 90.0)).await.unwrap();
    engine.add_prompt(explanation("light", 10.0)).await.unwrap();
    engine.add_prompt(explanation("never", 0.0)).await.unwrap();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..1000 {
        let chosen = engine
            .select_prompt("encouraging", PromptContext::Explanation)
            .await
            .unwrap();
        *counts.entry(chosen.name).or_default() += 1;
    }

    let heavy = counts.get("heavy").copied().unwrap_or(0);
    let light = counts.get("light").copied().unwrap_or(0);
    assert_eq!(counts.get("never"), None);
    assert_eq!(heavy + light, 1000);
    assert!(heavy > 800 && heavy < 980, "heavy chosen {} times", heavy);
}

#[tokio::test]
async fn test_without_ab_best_performer_wins() {
    let engine = engine_with(false, 1).await;
    let weak = engine.add_prompt(explanation("weak", 50.0)).await.unwrap();
    let strong = engine.add_prompt(explanation("strong", 50.0)).await.unwrap();

    engine.record_prompt_usage(&weak.id, Some(2), false).await.unwrap();
    engine.record_prompt_usage(&strong.id, Some(5), true).await.unwrap();
    let updated = engine.record_prompt_usage(&strong.id, None, true).await.unwrap();

    assert_eq!(updated.metrics.use_count, 2);
    assert_eq!(updated.metrics.rated_count, 1);
    assert!((updated.metrics.success_rate - 100.0).abs() < 1e-9);
    assert!((updated.metrics.effectiveness_score - 100.0).abs() < 1e-9);

    for _ in 0..5 {
        let chosen = engine
            .select_prompt("encouraging", PromptContext::Explanation)
            .await
            .unwrap();
        assert_eq!(chosen.name, "strong");
    }
}

#[tokio::test]
async fn test_inactive_prompts_are_not_selected() {
    let engine = engine_with(true, 3).await;
    let only = engine.add_prompt(explanation("only", 50.0)).await.unwrap();
    engine.store().set_prompt_active(&only.id, false).await.unwrap();

    let result = engine
        .select_prompt("encouraging", PromptContext::Explanation)
        .await;
    assert!(matches!(result, Err(TutorflowError::NoEligibleCandidate(_))));
}

#[tokio::test]
async fn test_render_with_defaults_and_adaptations() {
    let engine = engine_with(true, 3).await;
    let prompt = explanation("adaptive", 50.0)
        .with_adaptation(PromptAdaptation {
            condition: AdaptiveCondition::new(Metric::AverageScore, Operator::Lt, 50.0),
            modification: "Use simpler language.".to_string(),
            priority: 1,
        })
        .with_adaptation(PromptAdaptation {
            condition: AdaptiveCondition::new(Metric::FrustrationDetected, Operator::Eq, true),
            modification: "Acknowledge the learner's frustration first.".to_string(),
            priority: 5,
        });
    let prompt = engine.add_prompt(prompt).await.unwrap();

    let mut ctx = ContextSnapshot::new(15, Weekday::Sat);
    ctx.average_score = 35.0;
    ctx.frustration_detected = true;

    let values: HashMap<String, String> = [
        ("subject".to_string(), "algebra".to_string()),
        ("topic".to_string(), "linear equations".to_string()),
    ]
    .into_iter()
    .collect();

    let rendered = engine.render_prompt(&prompt.id, &values, &ctx).await.unwrap();
    assert_eq!(
        rendered.system,
        "You are a patient tutor for algebra.\n\nAcknowledge the learner's frustration first.\n\nUse simpler language."
    );
    assert_eq!(rendered.user, "Explain linear equations to the student.");

    let missing: HashMap<String, String> = HashMap::new();
    let result = engine.render_prompt(&prompt.id, &missing, &ctx).await;
    assert!(matches!(result, Err(TutorflowError::Template(_))));
}

#[tokio::test]
async fn test_invalid_rating_leaves_metrics_untouched() {
    let engine = engine_with(true, 3).await;
    let prompt = engine.add_prompt(explanation("rated", 50.0)).await.unwrap();

    let result = engine.record_prompt_usage(&prompt.id, Some(6), true).await;
    assert!(matches!(result, Err(TutorflowError::Validation(_))));

    let stored = engine.store().get_prompt(&prompt.id).await.unwrap();
    assert_eq!(stored.metrics.use_count, 0);
}
