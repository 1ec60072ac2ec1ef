// Maintenance Job Configuration
//
// Scheduling interval, batch size and time budget for background jobs.

use crate::error::{Result, TutorflowError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an individual maintenance job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Enable/disable this job
    pub enabled: bool,

    /// Interval between job runs (in seconds)
    #[serde(with = "serde_duration")]
    pub interval: Duration,

    /// Maximum number of records to process per batch
    pub batch_size: usize,

    /// Maximum duration for job execution (in seconds)
    #[serde(with = "serde_duration")]
    pub max_duration: Duration,
}

// Duration as whole seconds
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl JobConfig {
    /// Check bounds; `name` prefixes error messages
    pub fn validate(&self, name: &str) -> Result<()> {
        // Interval must be at least 1 hour
        if self.interval < Duration::from_secs(3600) {
            return Err(TutorflowError::Validation(format!(
                "{}: interval must be at least 1 hour",
                name
            )));
        }

        if self.batch_size == 0 || self.batch_size > 10000 {
            return Err(TutorflowError::Validation(format!(
                "{}: batch_size must be between 1 and 10000",
                name
            )));
        }

        if self.max_duration < Duration::from_secs(60) || self.max_duration > Duration::from_secs(1800)
        {
            return Err(TutorflowError::Validation(format!(
                "{}: max_duration must be between 1 and 30 minutes",
                name
            )));
        }

        Ok(())
    }
}
