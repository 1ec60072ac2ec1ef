//! TutorFlow - adaptive tutoring engine
//!
//! Decides, per learner and per moment, how a tutoring experience should
//! adapt:
//! - Adaptation rules matched against a learner context snapshot
//! - Scored, time-limited recommendations with a response lifecycle
//! - Tutor prompt templates with A/B selection and usage metrics
//!
//! # Architecture
//!
//! - **Types / Context**: identifiers, learner vocabularies, the context
//!   snapshot every condition is evaluated against
//! - **Rules / Recommendation / Prompt**: pure evaluation code
//! - **Storage**: the `EngineStore` trait and its libSQL backend
//! - **Engine**: wires evaluation to storage per request
//! - **Jobs**: background maintenance (recommendation expiration)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tutorflow_core::{AdaptationEngine, ContextSnapshot, EngineConfig, LibsqlStore};
//!
//! #[tokio::main]
//! async fn main() -> tutorflow_core::Result<()> {
//!     let store = Arc::new(LibsqlStore::new_local("tutorflow.db").await?);
//!     let engine = AdaptationEngine::new(store, &EngineConfig::default());
//!
//!     let context = ContextSnapshot::at(&chrono::Local::now());
//!     let rules = engine.evaluate_rules("learner-42", &context).await?;
//!     let recommendations = engine.generate_recommendations("learner-42", &context).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod prompt;
pub mod recommendation;
pub mod rules;
pub mod scoring;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use context::{ContextSnapshot, ContextSnapshotBuilder, Metric, MetricSource};
pub use engine::AdaptationEngine;
pub use error::{Result, TutorflowError};
pub use prompt::{Prompt, PromptContext, PromptMetrics, RenderedPrompt};
pub use recommendation::{
    Recommendation, RecommendationGenerator, RecommendationKind, RecommendationStatus,
    ResponseOutcome, UserResponse,
};
pub use rules::{ConditionSet, Rule, RuleCategory, TriggerType};
pub use storage::libsql::{ConnectionMode, LibsqlStore};
pub use storage::{EngineStore, RuleQuery};
pub use types::{Difficulty, LearningStyle, PromptId, RecommendationId, RuleId};
