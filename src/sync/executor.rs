//! The resumable sync executor.
//!
//! A full sync never fits one invocation, so callers advance a run by
//! calling `step()` repeatedly; each step dispatches exactly one chunk to
//! the current module's processor and persists the resulting cursor. The
//! `is_processing` bit on the run row is the only lock: it is taken with a
//! conditional update at the top of a step and released on every exit
//! path, so duplicate concurrent invocations degrade to a harmless "busy"
//! signal.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::credentials::CredentialProvider;
use crate::services::product_cache::ProductCacheService;
use crate::sync::cursor::CursorEnvelope;
use crate::sync::processors::{ChunkContext, ChunkProcessor};
use crate::sync::run::{
    ModuleState, RunLogEntry, RunStatus, StepReport, SyncError, SyncMode, SyncModule, SyncRun,
};
use crate::sync::store::RunStore;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub default_modules: Vec<SyncModule>,
    /// RUNNING runs with no persisted progress for this long get
    /// force-finished by the staleness sweep.
    pub stale_after: chrono::Duration,
    /// Log entries returned by `run_status`.
    pub log_tail: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_modules: SyncModule::default_set(),
            stale_after: chrono::Duration::minutes(5),
            log_tail: 50,
        }
    }
}

pub struct SyncExecutor {
    store: Arc<dyn RunStore>,
    credentials: Arc<dyn CredentialProvider>,
    cache: Arc<ProductCacheService>,
    processors: Vec<Arc<dyn ChunkProcessor>>,
    config: ExecutorConfig,
}

impl SyncExecutor {
    pub fn new(
        store: Arc<dyn RunStore>,
        credentials: Arc<dyn CredentialProvider>,
        cache: Arc<ProductCacheService>,
        processors: Vec<Arc<dyn ChunkProcessor>>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            credentials,
            cache,
            processors,
            config,
        }
    }

    fn processor_for(&self, module: SyncModule) -> Option<&Arc<dyn ChunkProcessor>> {
        self.processors.iter().find(|p| p.module() == module)
    }

    async fn log(&self, run_id: Uuid, level: &str, module: Option<SyncModule>, message: &str) {
        if let Err(e) = self.store.append_log(run_id, level, module, message).await {
            tracing::warn!("Failed to append log for run {}: {}", run_id, e);
        }
    }

    pub async fn create_run(
        &self,
        tenant_id: String,
        mode: SyncMode,
        period_start: Option<chrono::NaiveDate>,
        period_end: Option<chrono::NaiveDate>,
        modules: Option<Vec<SyncModule>>,
    ) -> Result<SyncRun, SyncError> {
        if mode == SyncMode::Period {
            match (period_start, period_end) {
                (Some(start), Some(end)) if start <= end => {}
                (Some(_), Some(_)) => {
                    return Err(SyncError::Invalid(
                        "period_start must not be after period_end".to_string(),
                    ))
                }
                _ => {
                    return Err(SyncError::Invalid(
                        "period mode requires period_start and period_end".to_string(),
                    ))
                }
            }
        }

        let modules = match modules {
            Some(list) if !list.is_empty() => list,
            Some(_) => {
                return Err(SyncError::Invalid(
                    "modules list must not be empty".to_string(),
                ))
            }
            None => self.config.default_modules.clone(),
        };

        let run = SyncRun::new(tenant_id, mode, period_start, period_end, modules);
        self.store.insert_run(&run).await?;

        let module_names: Vec<&str> = run.modules.iter().map(|m| m.as_str()).collect();
        tracing::info!(
            "Created sync run {} for {} ({}, modules: {})",
            run.id,
            run.tenant_id,
            run.mode.as_str(),
            module_names.join(", ")
        );
        self.log(
            run.id,
            "info",
            None,
            &format!("run created ({})", module_names.join(", ")),
        )
        .await;

        Ok(run)
    }

    /// QUEUED→RUNNING, plus a best-effort cache pre-warm for period runs.
    /// The pre-warm can fail or time out without consequence for the run.
    pub async fn start_run(&self, run_id: Uuid) -> Result<StepReport, SyncError> {
        let applied = self
            .store
            .transition_status(run_id, &[RunStatus::Queued], RunStatus::Running)
            .await?;

        if !applied {
            let run = self.store.load_run(run_id).await?;
            return Err(SyncError::InvalidTransition(run.status));
        }

        let run = self.store.load_run(run_id).await?;
        self.log(run.id, "info", None, "run started").await;

        if run.mode == SyncMode::Period {
            if let (Some(start), Some(end)) = (run.period_start, run.period_end) {
                match self.credentials.credential_for(&run.tenant_id).await {
                    Ok(credential) => {
                        if let Err(e) = self
                            .cache
                            .prewarm_for_period(&run.tenant_id, &credential, start, end)
                            .await
                        {
                            tracing::warn!("Cache pre-warm for run {} failed: {}", run.id, e);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Skipping cache pre-warm for run {}: credential unavailable ({})",
                            run.id,
                            e
                        );
                    }
                }
            }
        }

        Ok(StepReport::from_run(&run, 0))
    }

    /// Advance one chunk. Terminal runs are a no-op; a concurrently held
    /// lock yields a neutral busy report; everything else ends with the
    /// lock released and the run row persisted.
    pub async fn step(&self, run_id: Uuid) -> Result<StepReport, SyncError> {
        let run = self.store.load_run(run_id).await?;

        if run.status.is_terminal() {
            return Ok(StepReport::from_run(&run, 0));
        }
        if run.status == RunStatus::Queued {
            return Err(SyncError::InvalidTransition(RunStatus::Queued));
        }

        if !self.store.try_acquire_step_lock(run_id).await? {
            tracing::debug!("Run {} is already being stepped, reporting busy", run_id);
            return Ok(StepReport::busy(&run));
        }

        let outcome = self.step_locked(run_id).await;

        // Every exit path releases the lock, including store failures in
        // the step body.
        if let Err(e) = self.store.release_step_lock(run_id).await {
            tracing::error!("Failed to release step lock for run {}: {}", run_id, e);
        }

        outcome
    }

    async fn step_locked(&self, run_id: Uuid) -> Result<StepReport, SyncError> {
        // Reload under the lock; the pre-lock snapshot may already be
        // stale (cancel or a concurrent step landed in between).
        let mut run = self.store.load_run(run_id).await?;

        if run.status.is_terminal() {
            return Ok(StepReport::from_run(&run, 0));
        }

        if run.module_index >= run.modules.len() {
            run.status = RunStatus::Done;
            run.finished_at = Some(Utc::now().naive_utc());
            self.store.save_progress(&run).await?;
            self.log(run.id, "info", None, "run complete").await;
            return Ok(StepReport::from_run(&run, 0));
        }

        let module = run.modules[run.module_index];
        run.module_progress_mut(module).status = ModuleState::Running;

        let credential = match self.credentials.credential_for(&run.tenant_id).await {
            Ok(credential) => credential,
            Err(e) => {
                return self
                    .fail_run(run, module, format!("credential unavailable: {}", e))
                    .await
            }
        };

        let Some(processor) = self.processor_for(module) else {
            return self
                .fail_run(run, module, format!("no processor registered for {}", module))
                .await;
        };

        let ctx = ChunkContext {
            run_id: run.id,
            tenant_id: run.tenant_id.clone(),
            credential,
            mode: run.mode,
            period_start: run.period_start,
            period_end: run.period_end,
        };
        let cursor_state = run.cursor.clone().map(|envelope| envelope.state);

        match processor.process_chunk(&ctx, cursor_state).await {
            Ok(outcome) => {
                let progress = run.module_progress_mut(module);
                progress.processed += outcome.processed;
                progress.skipped += outcome.skipped;
                progress.errors += outcome.errors;

                if outcome.done {
                    progress.status = ModuleState::Done;
                    run.cursor = None;
                    run.module_index += 1;

                    if run.module_index >= run.modules.len() {
                        run.status = RunStatus::Done;
                        run.finished_at = Some(Utc::now().naive_utc());
                    }

                    self.store.save_progress(&run).await?;
                    self.log(
                        run.id,
                        "info",
                        Some(module),
                        &format!("module done ({} processed)", progress_snapshot(&run, module)),
                    )
                    .await;
                    if run.status == RunStatus::Done {
                        self.log(run.id, "info", None, "run complete").await;
                        tracing::info!("Sync run {} complete", run.id);
                    }
                } else {
                    let Some(state) = outcome.cursor else {
                        return self
                            .fail_run(
                                run,
                                module,
                                "processor returned an unfinished chunk without a cursor"
                                    .to_string(),
                            )
                            .await;
                    };
                    run.cursor = Some(CursorEnvelope::new(state));
                    self.store.save_progress(&run).await?;
                }

                Ok(StepReport::from_run(&run, outcome.processed))
            }
            Err(e) => self.fail_run(run, module, e.to_string()).await,
        }
    }

    /// Module-fatal path: persist FAILED with the message. Not an executor
    /// error — callers get a report, not an Err.
    async fn fail_run(
        &self,
        mut run: SyncRun,
        module: SyncModule,
        message: String,
    ) -> Result<StepReport, SyncError> {
        run.status = RunStatus::Failed;
        run.module_progress_mut(module).status = ModuleState::Failed;
        run.error_message = Some(message.clone());
        run.finished_at = Some(Utc::now().naive_utc());

        self.store.save_progress(&run).await?;
        self.log(run.id, "error", Some(module), &message).await;
        tracing::error!("Sync run {} failed in {}: {}", run.id, module, message);

        Ok(StepReport::from_run(&run, 0))
    }

    /// CANCELED from any non-terminal state; takes effect at the next
    /// step boundary.
    pub async fn cancel_run(&self, run_id: Uuid) -> Result<StepReport, SyncError> {
        let applied = self
            .store
            .transition_status(
                run_id,
                &[RunStatus::Queued, RunStatus::Running],
                RunStatus::Canceled,
            )
            .await?;

        if !applied {
            let run = self.store.load_run(run_id).await?;
            return Err(SyncError::InvalidTransition(run.status));
        }

        let run = self.store.load_run(run_id).await?;
        self.log(run.id, "info", None, "run canceled").await;
        tracing::info!("Sync run {} canceled", run.id);

        Ok(StepReport::from_run(&run, 0))
    }

    pub async fn run_status(
        &self,
        run_id: Uuid,
    ) -> Result<(SyncRun, Vec<RunLogEntry>), SyncError> {
        let run = self.store.load_run(run_id).await?;
        let logs = self.store.recent_logs(run_id, self.config.log_tail).await?;
        Ok((run, logs))
    }

    /// Recovery for a crash that left `is_processing` held: force-finish
    /// RUNNING runs with no persisted progress past the staleness window.
    pub async fn sweep_stale(&self) -> Result<u64, SyncError> {
        let cutoff = Utc::now().naive_utc() - self.config.stale_after;
        let stale = self.store.find_stale_running(cutoff).await?;
        let mut swept = 0;

        for mut run in stale {
            tracing::warn!(
                "Force-finishing stale run {} (no progress since {})",
                run.id,
                run.updated_at
            );

            run.status = RunStatus::Failed;
            if let Some(module) = run.current_module() {
                run.module_progress_mut(module).status = ModuleState::Failed;
            }
            run.error_message =
                Some("force-finished: no progress within the staleness window".to_string());
            run.finished_at = Some(Utc::now().naive_utc());

            self.store.save_progress(&run).await?;
            self.store.release_step_lock(run.id).await?;
            self.log(run.id, "error", None, "force-finished by staleness sweep")
                .await;
            swept += 1;
        }

        Ok(swept)
    }

    pub async fn active_runs(&self) -> Result<Vec<SyncRun>, SyncError> {
        self.store.find_active_runs().await
    }
}

fn progress_snapshot(run: &SyncRun, module: SyncModule) -> u64 {
    run.progress.get(&module).map(|p| p.processed).unwrap_or(0)
}
