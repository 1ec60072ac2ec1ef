//! Maintenance job commands

use clap::Subcommand;
use tutorflow_core::{error::Result, jobs::default_scheduler, jobs::JobStatus};

use super::helpers::CliContext;

#[derive(Subcommand)]
pub enum JobsAction {
    /// Run every enabled job once and exit
    Run,

    /// Run jobs on their intervals until interrupted
    Start,
}

/// Handle jobs command
pub async fn handle(action: JobsAction, ctx: &CliContext) -> Result<()> {
    let store = ctx.open_store().await?;
    let scheduler = default_scheduler(store, &ctx.config.jobs);

    match action {
        JobsAction::Run => {
            let runs = scheduler.run_all_once().await;
            if runs.is_empty() {
                println!("No jobs are enabled");
            }
            for run in runs {
                match (&run.status, &run.report) {
                    (JobStatus::Success, Some(report)) => println!(
                        "{}: processed {}, changed {} in {}ms",
                        run.job_name,
                        report.items_processed,
                        report.changes_made,
                        report.duration.as_millis()
                    ),
                    (status, report) => println!(
                        "{}: {:?} ({})",
                        run.job_name,
                        status,
                        report
                            .as_ref()
                            .and_then(|r| r.error_message.as_deref())
                            .unwrap_or("no details")
                    ),
                }
            }
            Ok(())
        }
        JobsAction::Start => {
            let stop = scheduler.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.store(false, std::sync::atomic::Ordering::SeqCst);
                }
            });
            println!("Scheduler running, press Ctrl-C to stop");
            scheduler
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("Scheduler failed: {}", e))?;
            Ok(())
        }
    }
}
