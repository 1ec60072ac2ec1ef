//! LibSQL storage backend implementation
//!
//! One `Database` and one long-lived `Connection` per store, so in-memory
//! databases keep their contents across calls. Outcome counters are bumped
//! with single `UPDATE` statements, never read-modify-write.

use crate::error::{Result, TutorflowError};
use crate::prompt::{validate_rating, Prompt, PromptContext, PromptMetrics};
use crate::recommendation::{
    Recommendation, RecommendationScores, RecommendationStatus, UserInteraction,
};
use crate::rules::{Effectiveness, Rule, RuleConfiguration, RuleScope};
use crate::storage::{schema, EngineStore, RuleQuery};
use crate::types::{PromptId, RecommendationId, RuleId};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{params, Builder, Connection, Database, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

/// Database connection mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(String),
    /// In-memory database (for testing)
    InMemory,
}

/// Compare-and-set retries before a usage record gives up
const MAX_USAGE_ATTEMPTS: usize = 256;

const RULE_COLUMNS: &str = "id, name, description, category, trigger_type, conditions, actions, \
    priority, cooldown_hours, max_triggers_per_user, total_triggers, successful_adaptations, \
    is_active, scope_kind, target_users, applicability, last_triggered, created_at, updated_at";

const RECOMMENDATION_COLUMNS: &str = "id, user_id, kind, category, title, reason, \
    relevance_score, confidence_score, priority_score, overall_score, target, generation, \
    suggested_timing, generated_at, valid_until, status, viewed_at, responded_at, response, \
    feedback, stale_response, impact";

const PROMPT_COLUMNS: &str = "id, name, personality, context_type, system_prompt, user_prompt, \
    variables, adaptations, metrics, effectiveness_score, test_weight, is_active, version, \
    created_at, updated_at";

/// LibSQL-backed `EngineStore`
pub struct LibsqlStore {
    // Owns the database the connection points into
    _db: Database,
    conn: Connection,
}

impl LibsqlStore {
    /// Open (creating if needed) a database and initialize the schema
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        info!("Connecting to LibSQL database: {:?}", mode);

        let db = match mode {
            ConnectionMode::Local(ref path) => {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            TutorflowError::Database(format!(
                                "Failed to create database directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }
                Builder::new_local(path).build().await.map_err(|e| {
                    TutorflowError::Database(format!("Failed to create local database: {}", e))
                })?
            }
            ConnectionMode::InMemory => Builder::new_local(":memory:").build().await.map_err(|e| {
                TutorflowError::Database(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let conn = db
            .connect()
            .map_err(|e| TutorflowError::Database(format!("Failed to get connection: {}", e)))?;

        schema::init_tables(&conn).await?;
        info!("LibSQL database connection established");

        Ok(Self { _db: db, conn })
    }

    pub async fn new_local(path: &str) -> Result<Self> {
        Self::new(ConnectionMode::Local(path.to_string())).await
    }

    pub async fn new_in_memory() -> Result<Self> {
        Self::new(ConnectionMode::InMemory).await
    }

    async fn query_rules(&self, sql: &str, args: Vec<libsql::Value>) -> Result<Vec<Rule>> {
        let mut rows = self.conn.query(sql, libsql::params_from_iter(args)).await?;
        let mut rules = Vec::new();
        while let Some(row) = rows.next().await? {
            rules.push(row_to_rule(&row)?);
        }
        Ok(rules)
    }

    async fn query_recommendations(
        &self,
        sql: &str,
        args: Vec<libsql::Value>,
    ) -> Result<Vec<Recommendation>> {
        let mut rows = self.conn.query(sql, libsql::params_from_iter(args)).await?;
        let mut recommendations = Vec::new();
        while let Some(row) = rows.next().await? {
            recommendations.push(row_to_recommendation(&row)?);
        }
        Ok(recommendations)
    }

    async fn query_prompts(&self, sql: &str, args: Vec<libsql::Value>) -> Result<Vec<Prompt>> {
        let mut rows = self.conn.query(sql, libsql::params_from_iter(args)).await?;
        let mut prompts = Vec::new();
        while let Some(row) = rows.next().await? {
            prompts.push(row_to_prompt(&row)?);
        }
        Ok(prompts)
    }
}

/// Fixed-width RFC 3339 so text comparison matches time order
fn ts(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TutorflowError::Database(format!("Invalid timestamp '{}': {}", text, e)))
}

fn parse_opt_ts(text: Option<String>) -> Result<Option<DateTime<Utc>>> {
    text.as_deref().map(parse_ts).transpose()
}

/// Serialized name of a unit enum variant
fn enum_text<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(text) => Ok(text),
        other => Err(TutorflowError::Other(format!(
            "Expected a unit variant, got {}",
            other
        ))),
    }
}

fn enum_from<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(text.to_string()))?)
}

fn narrow<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T> {
    T::try_from(value)
        .map_err(|_| TutorflowError::Database(format!("Value {} out of range for {}", value, column)))
}

fn write_error(err: libsql::Error, what: String) -> TutorflowError {
    let message = err.to_string();
    if message.contains("UNIQUE constraint failed") {
        TutorflowError::AlreadyExists(what)
    } else {
        TutorflowError::Database(message)
    }
}

fn scope_columns(scope: &RuleScope) -> Result<(&'static str, String)> {
    Ok(match scope {
        RuleScope::Global => ("global", "[]".to_string()),
        RuleScope::Targeted { user_ids } => ("targeted", serde_json::to_string(user_ids)?),
    })
}

fn row_to_rule(row: &Row) -> Result<Rule> {
    let id: String = row.get(0)?;
    let conditions: String = row.get(5)?;
    let actions: String = row.get(6)?;
    let max_triggers: Option<i64> = row.get(9)?;
    let is_active: i64 = row.get(12)?;
    let scope_kind: String = row.get(13)?;
    let target_users: String = row.get(14)?;
    let applicability: String = row.get(15)?;

    let scope = match scope_kind.as_str() {
        "targeted" => RuleScope::Targeted {
            user_ids: serde_json::from_str(&target_users)?,
        },
        _ => RuleScope::Global,
    };

    Ok(Rule {
        id: RuleId::from_string(&id)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: enum_from(&row.get::<String>(3)?)?,
        trigger_type: enum_from(&row.get::<String>(4)?)?,
        conditions: serde_json::from_str(&conditions)?,
        actions: serde_json::from_str(&actions)?,
        configuration: RuleConfiguration {
            priority: narrow(row.get::<i64>(7)?, "priority")?,
            cooldown_period_hours: narrow(row.get::<i64>(8)?, "cooldown_hours")?,
            max_triggers_per_user: max_triggers
                .map(|v| narrow(v, "max_triggers_per_user"))
                .transpose()?,
            effectiveness: Effectiveness {
                total_triggers: narrow(row.get::<i64>(10)?, "total_triggers")?,
                successful_adaptations: narrow(row.get::<i64>(11)?, "successful_adaptations")?,
            },
        },
        is_active: is_active != 0,
        scope,
        applicability: serde_json::from_str(&applicability)?,
        last_triggered: parse_opt_ts(row.get(16)?)?,
        created_at: parse_ts(&row.get::<String>(17)?)?,
        updated_at: parse_ts(&row.get::<String>(18)?)?,
    })
}

fn row_to_recommendation(row: &Row) -> Result<Recommendation> {
    let id: String = row.get(0)?;
    let target: String = row.get(10)?;
    let generation: String = row.get(11)?;
    let response: Option<String> = row.get(18)?;
    let stale: i64 = row.get(20)?;
    let impact: Option<String> = row.get(21)?;

    Ok(Recommendation {
        id: RecommendationId::from_string(&id)?,
        user_id: row.get(1)?,
        kind: enum_from(&row.get::<String>(2)?)?,
        category: row.get(3)?,
        title: row.get(4)?,
        reason: row.get(5)?,
        scores: RecommendationScores {
            relevance: narrow(row.get::<i64>(6)?, "relevance_score")?,
            confidence: narrow(row.get::<i64>(7)?, "confidence_score")?,
            priority: narrow(row.get::<i64>(8)?, "priority_score")?,
        },
        target: serde_json::from_str(&target)?,
        generation: serde_json::from_str(&generation)?,
        suggested_timing: enum_from(&row.get::<String>(12)?)?,
        generated_at: parse_ts(&row.get::<String>(13)?)?,
        valid_until: parse_ts(&row.get::<String>(14)?)?,
        interaction: UserInteraction {
            status: enum_from(&row.get::<String>(15)?)?,
            viewed_at: parse_opt_ts(row.get(16)?)?,
            responded_at: parse_opt_ts(row.get(17)?)?,
            response: response.as_deref().map(enum_from).transpose()?,
            feedback: row.get(19)?,
            stale_response: stale != 0,
        },
        impact: impact.as_deref().map(serde_json::from_str).transpose()?,
    })
}

fn row_to_prompt(row: &Row) -> Result<Prompt> {
    let id: String = row.get(0)?;
    let variables: String = row.get(6)?;
    let adaptations: String = row.get(7)?;
    let metrics: String = row.get(8)?;
    let is_active: i64 = row.get(11)?;

    Ok(Prompt {
        id: PromptId::from_string(&id)?,
        name: row.get(1)?,
        personality: row.get(2)?,
        context_type: enum_from(&row.get::<String>(3)?)?,
        system_prompt: row.get(4)?,
        user_prompt: row.get(5)?,
        variables: serde_json::from_str(&variables)?,
        adaptations: serde_json::from_str(&adaptations)?,
        metrics: serde_json::from_str(&metrics)?,
        test_weight: row.get(10)?,
        is_active: is_active != 0,
        version: narrow(row.get::<i64>(12)?, "version")?,
        created_at: parse_ts(&row.get::<String>(13)?)?,
        updated_at: parse_ts(&row.get::<String>(14)?)?,
    })
}

#[async_trait]
impl EngineStore for LibsqlStore {
    async fn create_rule(&self, rule: &Rule) -> Result<()> {
        debug!("Storing rule: {} ({})", rule.name, rule.id);

        let (scope_kind, target_users) = scope_columns(&rule.scope)?;
        let config = &rule.configuration;
        let sql = format!(
            "INSERT INTO adaptation_rules ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            RULE_COLUMNS
        );

        self.conn
            .execute(
                &sql,
                params![
                    rule.id.to_string(),
                    rule.name.clone(),
                    rule.description.clone(),
                    enum_text(&rule.category)?,
                    enum_text(&rule.trigger_type)?,
                    serde_json::to_string(&rule.conditions)?,
                    serde_json::to_string(&rule.actions)?,
                    config.priority as i64,
                    config.cooldown_period_hours as i64,
                    config.max_triggers_per_user.map(|v| v as i64),
                    config.effectiveness.total_triggers as i64,
                    config.effectiveness.successful_adaptations as i64,
                    rule.is_active as i64,
                    scope_kind,
                    target_users,
                    serde_json::to_string(&rule.applicability)?,
                    rule.last_triggered.as_ref().map(ts),
                    ts(&rule.created_at),
                    ts(&rule.updated_at)
                ],
            )
            .await
            .map_err(|e| write_error(e, format!("rule named '{}'", rule.name)))?;

        Ok(())
    }

    async fn get_rule(&self, id: &RuleId) -> Result<Rule> {
        let sql = format!("SELECT {} FROM adaptation_rules WHERE id = ?", RULE_COLUMNS);
        self.query_rules(&sql, vec![libsql::Value::Text(id.to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TutorflowError::RuleNotFound(id.to_string()))
    }

    async fn get_rule_by_name(&self, name: &str) -> Result<Rule> {
        let sql = format!("SELECT {} FROM adaptation_rules WHERE name = ?", RULE_COLUMNS);
        self.query_rules(&sql, vec![libsql::Value::Text(name.to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TutorflowError::RuleNotFound(name.to_string()))
    }

    async fn update_rule(&self, rule: &Rule) -> Result<()> {
        debug!("Updating rule: {} ({})", rule.name, rule.id);

        let (scope_kind, target_users) = scope_columns(&rule.scope)?;
        let config = &rule.configuration;
        let affected = self
            .conn
            .execute(
                r#"
                UPDATE adaptation_rules
                SET name = ?, description = ?, category = ?, trigger_type = ?,
                    conditions = ?, actions = ?, priority = ?, cooldown_hours = ?,
                    max_triggers_per_user = ?, total_triggers = ?, successful_adaptations = ?,
                    is_active = ?, scope_kind = ?, target_users = ?, applicability = ?,
                    last_triggered = ?, updated_at = ?
                WHERE id = ?
                "#,
                params![
                    rule.name.clone(),
                    rule.description.clone(),
                    enum_text(&rule.category)?,
                    enum_text(&rule.trigger_type)?,
                    serde_json::to_string(&rule.conditions)?,
                    serde_json::to_string(&rule.actions)?,
                    config.priority as i64,
                    config.cooldown_period_hours as i64,
                    config.max_triggers_per_user.map(|v| v as i64),
                    config.effectiveness.total_triggers as i64,
                    config.effectiveness.successful_adaptations as i64,
                    rule.is_active as i64,
                    scope_kind,
                    target_users,
                    serde_json::to_string(&rule.applicability)?,
                    rule.last_triggered.as_ref().map(ts),
                    ts(&rule.updated_at),
                    rule.id.to_string()
                ],
            )
            .await
            .map_err(|e| write_error(e, format!("rule named '{}'", rule.name)))?;

        if affected == 0 {
            return Err(TutorflowError::RuleNotFound(rule.id.to_string()));
        }
        Ok(())
    }

    async fn set_rule_active(&self, id: &RuleId, active: bool) -> Result<()> {
        let affected = self
            .conn
            .execute(
                "UPDATE adaptation_rules SET is_active = ?, updated_at = ? WHERE id = ?",
                params![active as i64, ts(&Utc::now()), id.to_string()],
            )
            .await?;

        if affected == 0 {
            return Err(TutorflowError::RuleNotFound(id.to_string()));
        }
        info!("Rule {} {}", id, if active { "enabled" } else { "disabled" });
        Ok(())
    }

    async fn list_rules(&self, query: &RuleQuery) -> Result<Vec<Rule>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<libsql::Value> = Vec::new();

        if let Some(category) = &query.category {
            clauses.push("category = ?");
            args.push(libsql::Value::Text(enum_text(category)?));
        }
        if query.active_only {
            clauses.push("is_active = 1");
        }
        if let Some(user_id) = &query.user_id {
            clauses.push(
                "(scope_kind = 'global' OR EXISTS (SELECT 1 FROM json_each(adaptation_rules.target_users) WHERE json_each.value = ?))",
            );
            args.push(libsql::Value::Text(user_id.clone()));
        }

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            r#"
            SELECT {} FROM adaptation_rules
            {}
            ORDER BY
                CASE WHEN total_triggers = 0 THEN 0.0
                     ELSE CAST(successful_adaptations AS REAL) / total_triggers END DESC,
                created_at ASC,
                rowid ASC
            "#,
            RULE_COLUMNS, filter
        );

        let rules = self.query_rules(&sql, args).await?;
        debug!("Listed {} rules for {:?}", rules.len(), query);
        Ok(rules)
    }

    async fn record_rule_outcome(
        &self,
        id: &RuleId,
        was_successful: bool,
        now: DateTime<Utc>,
    ) -> Result<Rule> {
        let affected = self
            .conn
            .execute(
                r#"
                UPDATE adaptation_rules
                SET total_triggers = total_triggers + 1,
                    successful_adaptations = successful_adaptations + ?,
                    last_triggered = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
                params![was_successful as i64, ts(&now), ts(&now), id.to_string()],
            )
            .await?;

        if affected == 0 {
            return Err(TutorflowError::RuleNotFound(id.to_string()));
        }

        let rule = self.get_rule(id).await?;
        debug!(
            "Recorded outcome for rule '{}' (success: {}), {}/{} successful",
            rule.name,
            was_successful,
            rule.configuration.effectiveness.successful_adaptations,
            rule.configuration.effectiveness.total_triggers
        );
        Ok(rule)
    }

    async fn create_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        debug!(
            "Storing recommendation {} for {}",
            recommendation.id, recommendation.user_id
        );

        let r = recommendation;
        let interaction = &r.interaction;
        let sql = format!(
            "INSERT INTO recommendations ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            RECOMMENDATION_COLUMNS
        );

        self.conn
            .execute(
                &sql,
                params![
                    r.id.to_string(),
                    r.user_id.clone(),
                    enum_text(&r.kind)?,
                    r.category.clone(),
                    r.title.clone(),
                    r.reason.clone(),
                    r.scores.relevance as i64,
                    r.scores.confidence as i64,
                    r.scores.priority as i64,
                    r.overall_score() as i64,
                    serde_json::to_string(&r.target)?,
                    serde_json::to_string(&r.generation)?,
                    enum_text(&r.suggested_timing)?,
                    ts(&r.generated_at),
                    ts(&r.valid_until),
                    enum_text(&interaction.status)?,
                    interaction.viewed_at.as_ref().map(ts),
                    interaction.responded_at.as_ref().map(ts),
                    interaction.response.as_ref().map(enum_text).transpose()?,
                    interaction.feedback.clone(),
                    interaction.stale_response as i64,
                    r.impact.as_ref().map(serde_json::to_string).transpose()?
                ],
            )
            .await
            .map_err(|e| write_error(e, format!("recommendation {}", r.id)))?;

        Ok(())
    }

    async fn get_recommendation(&self, id: &RecommendationId) -> Result<Recommendation> {
        let sql = format!(
            "SELECT {} FROM recommendations WHERE id = ?",
            RECOMMENDATION_COLUMNS
        );
        self.query_recommendations(&sql, vec![libsql::Value::Text(id.to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TutorflowError::RecommendationNotFound(id.to_string()))
    }

    async fn update_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        let r = recommendation;
        let interaction = &r.interaction;
        let affected = self
            .conn
            .execute(
                r#"
                UPDATE recommendations
                SET category = ?, title = ?, reason = ?,
                    relevance_score = ?, confidence_score = ?, priority_score = ?, overall_score = ?,
                    target = ?, generation = ?, suggested_timing = ?, valid_until = ?,
                    status = ?, viewed_at = ?, responded_at = ?, response = ?, feedback = ?,
                    stale_response = ?, impact = ?
                WHERE id = ?
                "#,
                params![
                    r.category.clone(),
                    r.title.clone(),
                    r.reason.clone(),
                    r.scores.relevance as i64,
                    r.scores.confidence as i64,
                    r.scores.priority as i64,
                    r.overall_score() as i64,
                    serde_json::to_string(&r.target)?,
                    serde_json::to_string(&r.generation)?,
                    enum_text(&r.suggested_timing)?,
                    ts(&r.valid_until),
                    enum_text(&interaction.status)?,
                    interaction.viewed_at.as_ref().map(ts),
                    interaction.responded_at.as_ref().map(ts),
                    interaction.response.as_ref().map(enum_text).transpose()?,
                    interaction.feedback.clone(),
                    interaction.stale_response as i64,
                    r.impact.as_ref().map(serde_json::to_string).transpose()?,
                    r.id.to_string()
                ],
            )
            .await?;

        if affected == 0 {
            return Err(TutorflowError::RecommendationNotFound(r.id.to_string()));
        }
        Ok(())
    }

    async fn list_recommendations(
        &self,
        user_id: &str,
        status: Option<RecommendationStatus>,
    ) -> Result<Vec<Recommendation>> {
        let mut args = vec![libsql::Value::Text(user_id.to_string())];
        let status_filter = match status {
            Some(s) => {
                args.push(libsql::Value::Text(enum_text(&s)?));
                "AND status = ?"
            }
            None => "",
        };

        let sql = format!(
            "SELECT {} FROM recommendations WHERE user_id = ? {} ORDER BY overall_score DESC, generated_at DESC",
            RECOMMENDATION_COLUMNS, status_filter
        );
        self.query_recommendations(&sql, args).await
    }

    async fn expire_recommendations(&self, now: DateTime<Utc>, limit: usize) -> Result<usize> {
        let affected = self
            .conn
            .execute(
                r#"
                UPDATE recommendations
                SET status = 'expired'
                WHERE id IN (
                    SELECT id FROM recommendations
                    WHERE status IN ('pending', 'viewed') AND valid_until < ?
                    ORDER BY valid_until ASC
                    LIMIT ?
                )
                "#,
                params![ts(&now), limit as i64],
            )
            .await?;

        if affected > 0 {
            info!("Expired {} recommendations", affected);
        }
        Ok(affected as usize)
    }

    async fn create_prompt(&self, prompt: &Prompt) -> Result<()> {
        debug!("Storing prompt: {} ({})", prompt.name, prompt.id);

        let sql = format!(
            "INSERT INTO ai_prompts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PROMPT_COLUMNS
        );
        self.conn
            .execute(
                &sql,
                params![
                    prompt.id.to_string(),
                    prompt.name.clone(),
                    prompt.personality.clone(),
                    enum_text(&prompt.context_type)?,
                    prompt.system_prompt.clone(),
                    prompt.user_prompt.clone(),
                    serde_json::to_string(&prompt.variables)?,
                    serde_json::to_string(&prompt.adaptations)?,
                    serde_json::to_string(&prompt.metrics)?,
                    prompt.metrics.effectiveness_score,
                    prompt.test_weight,
                    prompt.is_active as i64,
                    prompt.version as i64,
                    ts(&prompt.created_at),
                    ts(&prompt.updated_at)
                ],
            )
            .await
            .map_err(|e| write_error(e, format!("prompt {}", prompt.id)))?;

        Ok(())
    }

    async fn get_prompt(&self, id: &PromptId) -> Result<Prompt> {
        let sql = format!("SELECT {} FROM ai_prompts WHERE id = ?", PROMPT_COLUMNS);
        self.query_prompts(&sql, vec![libsql::Value::Text(id.to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TutorflowError::PromptNotFound(id.to_string()))
    }

    async fn update_prompt(&self, prompt: &Prompt) -> Result<()> {
        let affected = self
            .conn
            .execute(
                r#"
                UPDATE ai_prompts
                SET name = ?, personality = ?, context_type = ?, system_prompt = ?,
                    user_prompt = ?, variables = ?, adaptations = ?, metrics = ?,
                    effectiveness_score = ?, test_weight = ?, is_active = ?, version = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
                params![
                    prompt.name.clone(),
                    prompt.personality.clone(),
                    enum_text(&prompt.context_type)?,
                    prompt.system_prompt.clone(),
                    prompt.user_prompt.clone(),
                    serde_json::to_string(&prompt.variables)?,
                    serde_json::to_string(&prompt.adaptations)?,
                    serde_json::to_string(&prompt.metrics)?,
                    prompt.metrics.effectiveness_score,
                    prompt.test_weight,
                    prompt.is_active as i64,
                    prompt.version as i64,
                    ts(&prompt.updated_at),
                    prompt.id.to_string()
                ],
            )
            .await?;

        if affected == 0 {
            return Err(TutorflowError::PromptNotFound(prompt.id.to_string()));
        }
        Ok(())
    }

    async fn set_prompt_active(&self, id: &PromptId, active: bool) -> Result<()> {
        let affected = self
            .conn
            .execute(
                "UPDATE ai_prompts SET is_active = ?, updated_at = ? WHERE id = ?",
                params![active as i64, ts(&Utc::now()), id.to_string()],
            )
            .await?;

        if affected == 0 {
            return Err(TutorflowError::PromptNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_prompts(
        &self,
        personality: Option<&str>,
        context_type: Option<PromptContext>,
    ) -> Result<Vec<Prompt>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<libsql::Value> = Vec::new();

        if let Some(p) = personality {
            clauses.push("personality = ?");
            args.push(libsql::Value::Text(p.to_string()));
        }
        if let Some(c) = context_type {
            clauses.push("context_type = ?");
            args.push(libsql::Value::Text(enum_text(&c)?));
        }

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM ai_prompts {} ORDER BY effectiveness_score DESC, created_at ASC, rowid ASC",
            PROMPT_COLUMNS, filter
        );
        self.query_prompts(&sql, args).await
    }

    async fn record_prompt_usage(
        &self,
        id: &PromptId,
        rating: Option<u8>,
        successful: bool,
    ) -> Result<Prompt> {
        validate_rating(rating)?;

        // Compare-and-set on the metrics text: a concurrent writer makes the
        // UPDATE match zero rows and this caller re-reads and retries.
        for attempt in 1..=MAX_USAGE_ATTEMPTS {
            let mut rows = self
                .conn
                .query("SELECT metrics FROM ai_prompts WHERE id = ?", params![id.to_string()])
                .await?;
            let metrics_json: String = match rows.next().await? {
                Some(row) => row.get(0)?,
                None => return Err(TutorflowError::PromptNotFound(id.to_string())),
            };
            drop(rows);

            let now = Utc::now();
            let mut metrics: PromptMetrics = serde_json::from_str(&metrics_json)?;
            metrics.record(rating, successful, now)?;

            let changed = self
                .conn
                .execute(
                    "UPDATE ai_prompts SET metrics = ?, effectiveness_score = ?, updated_at = ? WHERE id = ? AND metrics = ?",
                    params![
                        serde_json::to_string(&metrics)?,
                        metrics.effectiveness_score,
                        ts(&now),
                        id.to_string(),
                        metrics_json
                    ],
                )
                .await?;

            if changed == 1 {
                debug!(
                    "Prompt {} used {} times, effectiveness {:.1}",
                    id, metrics.use_count, metrics.effectiveness_score
                );
                return self.get_prompt(id).await;
            }
            debug!("Prompt {} usage raced (attempt {}), retrying", id, attempt);
        }

        Err(TutorflowError::Database(format!(
            "Prompt {} usage not recorded after {} concurrent update retries",
            id, MAX_USAGE_ATTEMPTS
        )))
    }
}
