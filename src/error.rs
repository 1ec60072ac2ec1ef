//! Error types for the Tutorflow adaptation engine
//!
//! This module provides comprehensive error handling using thiserror for
//! structured error definitions and anyhow for error propagation.

use thiserror::Error;

/// Main error type for Tutorflow operations
#[derive(Error, Debug)]
pub enum TutorflowError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Entity rejected at write time (malformed bounds, empty names, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid identifier format
    #[error("Invalid ID: {0}")]
    InvalidId(#[from] uuid::Error),

    /// Rule not found
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// Recommendation not found
    #[error("Recommendation not found: {0}")]
    RecommendationNotFound(String),

    /// Prompt not found
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// A selection query produced zero candidates
    #[error("No eligible candidate: {0}")]
    NoEligibleCandidate(String),

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Prompt template could not be rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid operation (e.g., responding to an unknown state)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Tutorflow operations
pub type Result<T> = std::result::Result<T, TutorflowError>;

/// Convert anyhow::Error to TutorflowError
impl From<anyhow::Error> for TutorflowError {
    fn from(err: anyhow::Error) -> Self {
        TutorflowError::Other(err.to_string())
    }
}

impl From<libsql::Error> for TutorflowError {
    fn from(err: libsql::Error) -> Self {
        TutorflowError::Database(err.to_string())
    }
}
