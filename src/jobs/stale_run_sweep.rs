//! Out-of-band staleness sweep.
//!
//! A crash mid-step can leave a run RUNNING with `is_processing` held
//! forever; nothing inside the step path can recover that. This sweep
//! force-finishes runs that have made no persisted progress past the
//! executor's staleness window.

use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::sync::executor::SyncExecutor;

pub async fn start_stale_run_sweep_job(executor: Arc<SyncExecutor>) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            match executor.sweep_stale().await {
                Ok(0) => {}
                Ok(count) => tracing::warn!("Staleness sweep force-finished {} runs", count),
                Err(e) => tracing::error!("Staleness sweep failed: {}", e),
            }
        }
    });
}
