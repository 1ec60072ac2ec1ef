//! Performance benchmarks for per-request evaluation
//!
//! Covers the pure hot paths behind every request:
//! - Rule selection over a candidate list
//! - Recommendation generation from the default catalogue
//! - Weighted A/B prompt picks

use chrono::{Utc, Weekday};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tutorflow_core::config::RecommendationSettings;
use tutorflow_core::rules::{
    select_applicable, ConditionSet, EngagementConditions, PerformanceConditions,
};
use tutorflow_core::scoring::{weighted_pick, SeededRandom};
use tutorflow_core::{
    ContextSnapshot, RecommendationGenerator, Rule, RuleCategory, TriggerType,
};

fn sample_context() -> ContextSnapshot {
    let mut ctx = ContextSnapshot::new(19, Weekday::Tue);
    ctx.completion_rate = 42.0;
    ctx.average_score = 58.0;
    ctx.focus_score = 35.0;
    ctx.session_count = 12;
    ctx.ai_effectiveness = 44.0;
    ctx
}

fn sample_rules(count: usize) -> Vec<Rule> {
    (0..count)
        .map(|i| {
            Rule::new(
                format!("rule-{}", i),
                RuleCategory::Engagement,
                TriggerType::Trigger,
            )
            .with_priority((i % 10) as u8 + 1)
            .with_conditions(ConditionSet {
                performance: Some(PerformanceConditions {
                    max_average_score: Some(40.0 + (i % 40) as f64),
                    ..Default::default()
                }),
                engagement: Some(EngagementConditions {
                    min_session_count: Some((i % 20) as u32),
                    ..Default::default()
                }),
                ..Default::default()
            })
        })
        .collect()
}

fn bench_rule_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_selection");
    let ctx = sample_context();
    let now = Utc::now();

    for size in [10usize, 100, 1000] {
        let rules = sample_rules(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rules, |b, rules| {
            b.iter(|| select_applicable(black_box(rules), black_box(&ctx), "learner", now))
        });
    }

    group.finish();
}

fn bench_recommendation_generation(c: &mut Criterion) {
    let generator = RecommendationGenerator::with_default_catalogue(RecommendationSettings::default());
    let ctx = sample_context();
    let now = Utc::now();

    c.bench_function("generate_default_catalogue", |b| {
        b.iter(|| generator.generate(black_box("learner"), black_box(&ctx), now))
    });
}

fn bench_weighted_pick(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_pick");
    let mut rng = SeededRandom::new(42);

    for size in [2usize, 8, 64] {
        let weights: Vec<f64> = (0..size).map(|i| (i % 7) as f64 * 10.0).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &weights, |b, weights| {
            b.iter(|| weighted_pick(black_box(weights), &mut rng))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_rule_selection,
    bench_recommendation_generation,
    bench_weighted_pick
);
criterion_main!(benches);
