//! Storage layer for rules, recommendations and prompts
//!
//! The engine talks to persistence only through `EngineStore`. The libSQL
//! implementation lives in `libsql`, its table definitions in `schema`.

pub mod libsql;
pub mod schema;

use crate::error::Result;
use crate::prompt::{Prompt, PromptContext};
use crate::recommendation::{Recommendation, RecommendationStatus};
use crate::rules::{Rule, RuleCategory};
use crate::types::{PromptId, RecommendationId, RuleId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Predicate for candidate rule lookups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleQuery {
    /// Restrict to one category
    pub category: Option<RuleCategory>,
    /// Skip rules whose `is_active` flag is off
    pub active_only: bool,
    /// Global rules plus rules targeted at this learner
    pub user_id: Option<String>,
}

impl RuleQuery {
    /// Active rules that may apply to `user_id`
    pub fn candidates_for(user_id: impl Into<String>) -> Self {
        Self {
            category: None,
            active_only: true,
            user_id: Some(user_id.into()),
        }
    }
}

/// Persistence operations used by the adaptation engine
#[async_trait]
pub trait EngineStore: Send + Sync {
    /// Insert a new rule; duplicate names are rejected
    async fn create_rule(&self, rule: &Rule) -> Result<()>;

    async fn get_rule(&self, id: &RuleId) -> Result<Rule>;

    async fn get_rule_by_name(&self, name: &str) -> Result<Rule>;

    /// Overwrite every field of an existing rule
    async fn update_rule(&self, rule: &Rule) -> Result<()>;

    async fn set_rule_active(&self, id: &RuleId, active: bool) -> Result<()>;

    /// Rules matching the query, highest stored success rate first, then by
    /// creation order
    async fn list_rules(&self, query: &RuleQuery) -> Result<Vec<Rule>>;

    /// Count a trigger (and a success) and stamp `last_triggered` in one
    /// atomic update; returns the updated rule
    async fn record_rule_outcome(
        &self,
        id: &RuleId,
        was_successful: bool,
        now: DateTime<Utc>,
    ) -> Result<Rule>;

    async fn create_recommendation(&self, recommendation: &Recommendation) -> Result<()>;

    async fn get_recommendation(&self, id: &RecommendationId) -> Result<Recommendation>;

    async fn update_recommendation(&self, recommendation: &Recommendation) -> Result<()>;

    /// A learner's recommendations, best overall score first
    async fn list_recommendations(
        &self,
        user_id: &str,
        status: Option<RecommendationStatus>,
    ) -> Result<Vec<Recommendation>>;

    /// Expire up to `limit` open recommendations whose validity has passed;
    /// returns how many changed
    async fn expire_recommendations(&self, now: DateTime<Utc>, limit: usize) -> Result<usize>;

    async fn create_prompt(&self, prompt: &Prompt) -> Result<()>;

    async fn get_prompt(&self, id: &PromptId) -> Result<Prompt>;

    async fn update_prompt(&self, prompt: &Prompt) -> Result<()>;

    async fn set_prompt_active(&self, id: &PromptId, active: bool) -> Result<()>;

    /// Prompts filtered by personality and context type, active or not
    async fn list_prompts(
        &self,
        personality: Option<&str>,
        context_type: Option<PromptContext>,
    ) -> Result<Vec<Prompt>>;

    /// Fold one use into a prompt's metrics; returns the updated prompt
    async fn record_prompt_usage(
        &self,
        id: &PromptId,
        rating: Option<u8>,
        successful: bool,
    ) -> Result<Prompt>;
}
