// Background Job Scheduler
//
// Runs registered maintenance jobs when they are due, each bounded by its
// configured time budget, and keeps an in-memory history of runs.

use super::config::JobConfig;
use crate::error::TutorflowError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

/// Runs kept in memory per scheduler
const HISTORY_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Job execution failed: {0}")]
    ExecutionError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] TutorflowError),

    #[error("Job configuration invalid: {0}")]
    ConfigError(String),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Job error: {0}")]
    JobError(#[from] JobError),
}

/// Report generated after job execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobReport {
    /// Number of records examined
    pub items_processed: usize,

    /// Number of records changed
    pub changes_made: usize,

    /// Duration of job execution
    #[serde(with = "serde_duration_millis")]
    pub duration: Duration,

    /// Number of errors encountered
    pub errors: usize,

    /// Optional error message if job failed
    pub error_message: Option<String>,
}

// Duration as milliseconds
mod serde_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Trait for maintenance jobs
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    /// Job name (for logging and tracking)
    fn name(&self) -> &str;

    /// Run the job with given configuration
    async fn run(&self, config: &JobConfig) -> Result<JobReport, JobError>;

    /// Check if the job is due under the given configuration
    async fn should_run(&self, config: &JobConfig) -> Result<bool, JobError>;
}

/// Job execution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: String,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub report: Option<JobReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Running,
    Success,
    Failed,
    Timeout,
}

struct RegisteredJob {
    job: Arc<dyn MaintenanceJob>,
    config: JobConfig,
}

/// Background job scheduler
pub struct BackgroundScheduler {
    jobs: Vec<RegisteredJob>,
    running: Arc<AtomicBool>,
    tick: Duration,
    history: Mutex<Vec<JobRun>>,
}

impl Default for BackgroundScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            tick: Duration::from_secs(60),
            history: Mutex::new(Vec::new()),
        }
    }

    /// How often `start` checks for due jobs
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Register a job with its configuration
    pub fn register_job(&mut self, job: Arc<dyn MaintenanceJob>, config: JobConfig) {
        self.jobs.push(RegisteredJob { job, config });
    }

    /// Start the scheduler (runs until stopped)
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        tracing::info!("Starting background maintenance scheduler");

        loop {
            if !self.running.load(Ordering::SeqCst) {
                tracing::info!("Stopping background maintenance scheduler");
                break;
            }

            for registered in &self.jobs {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                if !registered.config.enabled {
                    continue;
                }

                match registered.job.should_run(&registered.config).await {
                    Ok(true) => {
                        tracing::info!("Running maintenance job: {}", registered.job.name());
                        self.run_job(registered).await;
                    }
                    Ok(false) => {
                        tracing::debug!("Job {} not due yet", registered.job.name());
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to check if job {} should run: {}",
                            registered.job.name(),
                            e
                        );
                    }
                }
            }

            sleep(self.tick).await;
        }

        Ok(())
    }

    /// Stop the scheduler
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Handle that stops the scheduler from another task
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run every enabled job once, due or not
    pub async fn run_all_once(&self) -> Vec<JobRun> {
        let mut runs = Vec::new();
        for registered in &self.jobs {
            if !registered.config.enabled {
                tracing::debug!("Skipping disabled job {}", registered.job.name());
                continue;
            }
            runs.push(self.run_job(registered).await);
        }
        runs
    }

    /// Run a specific job with timeout
    async fn run_job(&self, registered: &RegisteredJob) -> JobRun {
        let job_name = registered.job.name();
        let config = &registered.config;
        let start_time = Utc::now();
        let job_id = uuid::Uuid::new_v4().to_string();

        tracing::info!("Starting job {} (id: {})", job_name, job_id);

        let result = timeout(config.max_duration, registered.job.run(config)).await;

        let (status, report) = match result {
            Ok(Ok(report)) => {
                tracing::info!(
                    "Job {} completed successfully: {} changes in {:?}",
                    job_name,
                    report.changes_made,
                    report.duration
                );
                (JobStatus::Success, report)
            }
            Ok(Err(e)) => {
                tracing::error!("Job {} failed: {}", job_name, e);
                (
                    JobStatus::Failed,
                    JobReport {
                        duration: Utc::now()
                            .signed_duration_since(start_time)
                            .to_std()
                            .unwrap_or_default(),
                        errors: 1,
                        error_message: Some(e.to_string()),
                        ..Default::default()
                    },
                )
            }
            Err(_) => {
                let e = JobError::Timeout(config.max_duration);
                tracing::error!("Job {}: {}", job_name, e);
                (
                    JobStatus::Timeout,
                    JobReport {
                        duration: config.max_duration,
                        errors: 1,
                        error_message: Some(e.to_string()),
                        ..Default::default()
                    },
                )
            }
        };

        let job_run = JobRun {
            id: job_id,
            job_name: job_name.to_string(),
            started_at: start_time,
            completed_at: Some(Utc::now()),
            status,
            report: Some(report),
        };

        self.record_job_run(&job_run).await;
        job_run
    }

    async fn record_job_run(&self, job_run: &JobRun) {
        tracing::debug!(
            "Job run recorded: {} - {:?}",
            job_run.job_name,
            job_run.status
        );
        let mut history = self.history.lock().await;
        history.push(job_run.clone());
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }
    }

    /// Most recent runs first, optionally for one job
    pub async fn get_job_history(&self, job_name: Option<&str>, limit: usize) -> Vec<JobRun> {
        let history = self.history.lock().await;
        history
            .iter()
            .rev()
            .filter(|run| job_name.map_or(true, |name| run.job_name == name))
            .take(limit)
            .cloned()
            .collect()
    }
}
