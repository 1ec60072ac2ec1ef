// Recommendation Expiration Job
//
// Moves every pending or viewed recommendation whose validity window has
// passed to `expired`. Runs in batches of `batch_size` until a batch comes
// back short. Safe to run alongside live evaluations.

use super::config::JobConfig;
use super::scheduler::{JobError, JobReport, MaintenanceJob};
use crate::storage::EngineStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub const JOB_NAME: &str = "recommendation_expiration";

/// Expiration sweep job
pub struct ExpirationJob<S: EngineStore> {
    store: Arc<S>,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl<S: EngineStore> ExpirationJob<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            last_run: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<S: EngineStore + 'static> MaintenanceJob for ExpirationJob<S> {
    fn name(&self) -> &str {
        JOB_NAME
    }

    async fn run(&self, config: &JobConfig) -> Result<JobReport, JobError> {
        let start = Instant::now();
        let now = Utc::now();
        let mut changes_made = 0;
        let mut batches = 0;

        loop {
            let expired = self
                .store
                .expire_recommendations(now, config.batch_size)
                .await?;
            changes_made += expired;
            batches += 1;
            if expired < config.batch_size {
                break;
            }
        }

        *self.last_run.lock().await = Some(now);

        tracing::info!(
            "Expiration sweep complete: {} recommendations expired in {} batches",
            changes_made,
            batches
        );

        Ok(JobReport {
            items_processed: changes_made,
            changes_made,
            duration: start.elapsed(),
            errors: 0,
            error_message: None,
        })
    }

    async fn should_run(&self, config: &JobConfig) -> Result<bool, JobError> {
        let last_run = *self.last_run.lock().await;
        Ok(match last_run {
            None => true,
            Some(at) => {
                let elapsed = Utc::now().signed_duration_since(at).to_std().unwrap_or_default();
                elapsed >= config.interval
            }
        })
    }
}
