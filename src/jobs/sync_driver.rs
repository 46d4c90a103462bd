//! Background driver that advances active sync runs.
//!
//! The executor itself never owns a worker; this job plays the role of the
//! external caller, stepping each active run a bounded number of chunks
//! per tick so one giant run cannot starve the others.

use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::sync::executor::SyncExecutor;
use crate::sync::run::RunStatus;

const MAX_STEPS_PER_TICK: usize = 25;

pub async fn start_sync_driver_job(executor: Arc<SyncExecutor>) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(30));

        loop {
            interval.tick().await;

            if let Err(e) = drive_active_runs(&executor).await {
                tracing::error!("Sync driver pass failed: {}", e);
            }
        }
    });
}

async fn drive_active_runs(
    executor: &SyncExecutor,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let runs = executor.active_runs().await?;

    for run in runs {
        if run.status == RunStatus::Queued {
            if let Err(e) = executor.start_run(run.id).await {
                tracing::error!("Failed to start queued run {}: {}", run.id, e);
                continue;
            }
        }

        for _ in 0..MAX_STEPS_PER_TICK {
            match executor.step(run.id).await {
                Ok(report) if report.busy => {
                    tracing::debug!("Run {} busy, leaving it for the next tick", run.id);
                    break;
                }
                Ok(report) if report.done => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!("Step on run {} errored: {}", run.id, e);
                    break;
                }
            }
        }
    }

    Ok(())
}
