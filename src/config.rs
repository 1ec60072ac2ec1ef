//! Engine configuration.
//!
//! Layering, lowest to highest precedence:
//! 1. Built-in defaults (`EngineConfig::default`)
//! 2. Optional TOML file
//! 3. `TUTORFLOW__*` environment variables, `__` separating sections
//!    (e.g. `TUTORFLOW__SELECTION__AB_TESTING_ENABLED=false`)

use crate::error::{Result, TutorflowError};
use crate::jobs::JobConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_PREFIX: &str = "TUTORFLOW";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseSettings,
    pub selection: SelectionSettings,
    pub recommendations: RecommendationSettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file; falls back to the platform data directory
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    /// Draw prompts by test weight instead of always using the best one
    pub ab_testing_enabled: bool,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            ab_testing_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationSettings {
    /// Upper bound on recommendations produced per generation run
    pub max_per_run: usize,
    pub algorithm: String,
    pub version: String,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            max_per_run: 5,
            algorithm: "rule_based".to_string(),
            version: "1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsSettings {
    pub expiration: JobConfig,
}

impl Default for JobsSettings {
    fn default() -> Self {
        Self {
            expiration: JobConfig {
                enabled: true,
                interval: Duration::from_secs(3600), // 1 hour
                batch_size: 1000,
                max_duration: Duration::from_secs(300), // 5 minutes
            },
        }
    }
}

impl EngineConfig {
    /// Load defaults, then `file` (if given), then the environment
    ///
    /// An explicitly named file must exist.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(toml_str)
            .map_err(|e| TutorflowError::Validation(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TutorflowError::Other(format!("Failed to render configuration: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.recommendations.max_per_run == 0 {
            return Err(TutorflowError::Validation(
                "recommendations.max_per_run must be at least 1".to_string(),
            ));
        }
        if self.recommendations.algorithm.trim().is_empty() {
            return Err(TutorflowError::Validation(
                "recommendations.algorithm cannot be empty".to_string(),
            ));
        }
        self.jobs.expiration.validate("expiration")?;
        Ok(())
    }
}
