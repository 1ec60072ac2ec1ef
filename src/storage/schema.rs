//! Database schema for rules, recommendations and prompts.
//!
//! Nested structures (conditions, actions, targets, prompt variables) are
//! JSON text. Counters, scores, statuses and timestamps get their own
//! columns so selection and sweeps can filter and update them in SQL.

use crate::error::{Result, TutorflowError};
use libsql::Connection;
use tracing::{debug, info};

const TABLES: &[(&str, &str)] = &[
    (
        "adaptation_rules",
        r#"
        CREATE TABLE IF NOT EXISTS adaptation_rules (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            trigger_type TEXT NOT NULL,
            conditions TEXT NOT NULL,
            actions TEXT NOT NULL,
            priority INTEGER NOT NULL,
            cooldown_hours INTEGER NOT NULL,
            max_triggers_per_user INTEGER,
            total_triggers INTEGER NOT NULL DEFAULT 0,
            successful_adaptations INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            scope_kind TEXT NOT NULL DEFAULT 'global',
            target_users TEXT NOT NULL DEFAULT '[]',
            applicability TEXT NOT NULL,
            last_triggered TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "recommendations",
        r#"
        CREATE TABLE IF NOT EXISTS recommendations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            relevance_score INTEGER NOT NULL,
            confidence_score INTEGER NOT NULL,
            priority_score INTEGER NOT NULL,
            overall_score INTEGER NOT NULL,
            target TEXT NOT NULL,
            generation TEXT NOT NULL,
            suggested_timing TEXT NOT NULL,
            generated_at TEXT NOT NULL,
            valid_until TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            viewed_at TEXT,
            responded_at TEXT,
            response TEXT,
            feedback TEXT,
            stale_response INTEGER NOT NULL DEFAULT 0,
            impact TEXT
        )
        "#,
    ),
    (
        "ai_prompts",
        r#"
        CREATE TABLE IF NOT EXISTS ai_prompts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            personality TEXT NOT NULL,
            context_type TEXT NOT NULL,
            system_prompt TEXT NOT NULL,
            user_prompt TEXT NOT NULL,
            variables TEXT NOT NULL,
            adaptations TEXT NOT NULL,
            metrics TEXT NOT NULL,
            effectiveness_score REAL NOT NULL DEFAULT 0,
            test_weight REAL NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_rules_category_active ON adaptation_rules(category, is_active)",
    "CREATE INDEX IF NOT EXISTS idx_recommendations_user_status ON recommendations(user_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_recommendations_open_validity ON recommendations(status, valid_until)",
    "CREATE INDEX IF NOT EXISTS idx_prompts_slot ON ai_prompts(personality, context_type, is_active)",
];

/// Create all tables and indexes (idempotent)
pub async fn init_tables(conn: &Connection) -> Result<()> {
    for (name, ddl) in TABLES {
        conn.execute(ddl, libsql::params![])
            .await
            .map_err(|e| TutorflowError::Database(format!("Failed to create {} table: {}", name, e)))?;
        debug!("Ensured table {}", name);
    }

    for ddl in INDEXES {
        conn.execute(ddl, libsql::params![])
            .await
            .map_err(|e| TutorflowError::Database(format!("Failed to create index: {}", e)))?;
    }

    info!("Database schema initialized ({} tables)", TABLES.len());
    Ok(())
}
