//! Background maintenance jobs
//!
//! - Recommendation expiration: sweeps overdue pending/viewed
//!   recommendations to `expired`

pub mod config;
pub mod expiration;
pub mod scheduler;

pub use config::JobConfig;
pub use expiration::ExpirationJob;
pub use scheduler::{BackgroundScheduler, JobError, JobReport, JobRun, JobStatus, MaintenanceJob, SchedulerError};

use crate::config::JobsSettings;
use crate::storage::EngineStore;
use std::sync::Arc;

/// Scheduler with every built-in job registered
pub fn default_scheduler<S: EngineStore + 'static>(
    store: Arc<S>,
    settings: &JobsSettings,
) -> BackgroundScheduler {
    let mut scheduler = BackgroundScheduler::new();
    scheduler.register_job(Arc::new(ExpirationJob::new(store)), settings.expiration.clone());
    scheduler
}
