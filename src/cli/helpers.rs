//! Shared helper functions for CLI commands
//!
//! Database path resolution, engine construction and JSON argument parsing.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tutorflow_core::{error::Result, AdaptationEngine, EngineConfig, LibsqlStore};

/// Settings every command needs
pub struct CliContext {
    pub db_path: String,
    pub config: EngineConfig,
}

impl CliContext {
    pub async fn open_store(&self) -> Result<Arc<LibsqlStore>> {
        debug!("Opening database at {}", self.db_path);
        let store = LibsqlStore::new_local(&self.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", self.db_path))?;
        Ok(Arc::new(store))
    }

    pub async fn open_engine(&self) -> Result<AdaptationEngine<LibsqlStore>> {
        let store = self.open_store().await?;
        Ok(AdaptationEngine::new(store, &self.config))
    }
}

/// Get the default database path using XDG_DATA_HOME standard
pub fn get_default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutorflow")
        .join("tutorflow.db")
}

/// Database path from CLI arg, env var, config file, or default
pub fn get_db_path(cli_path: Option<String>, config: &EngineConfig) -> String {
    cli_path
        .or_else(|| std::env::var("TUTORFLOW_DB_PATH").ok())
        .filter(|path| !path.is_empty())
        .or_else(|| config.database.path.clone())
        .unwrap_or_else(|| get_default_db_path().to_string_lossy().to_string())
}

/// Inline JSON, or `@path` to read JSON from a file
pub fn parse_json_arg<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} from {}", what, path))?,
        None => raw.to_string(),
    };
    let value = serde_json::from_str(&text).with_context(|| format!("Invalid {} JSON", what))?;
    Ok(value)
}

/// `key=value` pairs from repeated `--var` arguments
pub fn parse_key_values(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| {
                    tutorflow_core::TutorflowError::Validation(format!(
                        "Expected key=value, got '{}'",
                        pair
                    ))
                })
        })
        .collect()
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
