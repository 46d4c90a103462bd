//! Domain types for one resumable sync run.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::services::credentials::CredentialError;
use crate::services::erp_api::ErpApiError;
use crate::sync::cursor::{CursorEnvelope, CursorState};

/// One independently-synced data domain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncModule {
    Invoices,
    Receivables,
    Orders,
}

impl SyncModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncModule::Invoices => "invoices",
            SyncModule::Receivables => "receivables",
            SyncModule::Orders => "orders",
        }
    }

    /// Default module order for a new run. Orders go last: their fan-out
    /// chunks are the slowest by far.
    pub fn default_set() -> Vec<SyncModule> {
        vec![
            SyncModule::Invoices,
            SyncModule::Receivables,
            SyncModule::Orders,
        ]
    }
}

impl std::fmt::Display for SyncModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    Running,
    Done,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "QUEUED",
            RunStatus::Running => "RUNNING",
            RunStatus::Done => "DONE",
            RunStatus::Failed => "FAILED",
            RunStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<RunStatus> {
        match s {
            "QUEUED" => Some(RunStatus::Queued),
            "RUNNING" => Some(RunStatus::Running),
            "DONE" => Some(RunStatus::Done),
            "FAILED" => Some(RunStatus::Failed),
            "CANCELED" => Some(RunStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Done | RunStatus::Failed | RunStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Incremental,
    Period,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Incremental => "incremental",
            SyncMode::Period => "period",
        }
    }

    pub fn parse(s: &str) -> Option<SyncMode> {
        match s {
            "incremental" => Some(SyncMode::Incremental),
            "period" => Some(SyncMode::Period),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Pending,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleProgress {
    pub status: ModuleState,
    pub processed: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl Default for ModuleProgress {
    fn default() -> Self {
        Self {
            status: ModuleState::Pending,
            processed: 0,
            skipped: 0,
            errors: 0,
        }
    }
}

/// In-memory form of one `sync_runs` row. The `is_processing` lock bit is
/// read-only here: it is flipped exclusively through the store's
/// acquire/release operations, never through a whole-row update.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRun {
    pub id: Uuid,
    pub tenant_id: String,
    pub status: RunStatus,
    pub mode: SyncMode,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub modules: Vec<SyncModule>,
    pub module_index: usize,
    pub cursor: Option<CursorEnvelope>,
    pub progress: BTreeMap<SyncModule, ModuleProgress>,
    pub is_processing: bool,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl SyncRun {
    pub fn new(
        tenant_id: String,
        mode: SyncMode,
        period_start: Option<NaiveDate>,
        period_end: Option<NaiveDate>,
        modules: Vec<SyncModule>,
    ) -> Self {
        let now = Utc::now().naive_utc();
        let progress = modules
            .iter()
            .map(|m| (*m, ModuleProgress::default()))
            .collect();

        Self {
            id: Uuid::new_v4(),
            tenant_id,
            status: RunStatus::Queued,
            mode,
            period_start,
            period_end,
            modules,
            module_index: 0,
            cursor: None,
            progress,
            is_processing: false,
            error_message: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    pub fn current_module(&self) -> Option<SyncModule> {
        self.modules.get(self.module_index).copied()
    }

    pub fn module_progress_mut(&mut self, module: SyncModule) -> &mut ModuleProgress {
        self.progress.entry(module).or_default()
    }

    /// Module completion plus the current module's within-cursor fraction.
    pub fn overall_progress_percent(&self) -> u8 {
        if self.modules.is_empty() || self.status == RunStatus::Done {
            return if self.status == RunStatus::Done { 100 } else { 0 };
        }

        let per_module = 100.0 / self.modules.len() as f64;
        let mut pct = per_module * self.module_index.min(self.modules.len()) as f64;

        if let Some(env) = &self.cursor {
            let fraction = match &env.state {
                CursorState::Paged {
                    page,
                    total_pages: Some(total),
                } if *total > 0 => (page.saturating_sub(1)) as f64 / *total as f64,
                CursorState::FanOut {
                    candidate_ids,
                    processed_ids,
                } if !candidate_ids.is_empty() => {
                    processed_ids.len() as f64 / candidate_ids.len() as f64
                }
                _ => 0.0,
            };
            pct += per_module * fraction.clamp(0.0, 1.0);
        }

        pct.round().clamp(0.0, 100.0) as u8
    }
}

/// What one executor operation reports back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// Lock contention: nothing happened, try again shortly.
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_module: Option<SyncModule>,
    /// Records persisted by this step.
    pub processed: u64,
    /// True when no work remains on this run.
    pub done: bool,
    pub overall_progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    pub fn busy(run: &SyncRun) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            busy: true,
            current_module: run.current_module(),
            processed: 0,
            done: false,
            overall_progress_percent: run.overall_progress_percent(),
            error: None,
        }
    }

    pub fn from_run(run: &SyncRun, processed: u64) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            busy: false,
            current_module: run.current_module(),
            processed,
            done: run.status.is_terminal(),
            overall_progress_percent: run.overall_progress_percent(),
            error: run.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunLogEntry {
    pub logged_at: NaiveDateTime,
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync run {0} not found")]
    RunNotFound(Uuid),
    #[error("invalid transition: run is {}", .0.as_str())]
    InvalidTransition(RunStatus),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("cursor rejected: {0}")]
    BadCursor(String),
    #[error("storage error: {0}")]
    Store(String),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("{0}")]
    Module(String),
}

impl From<sea_orm::DbErr> for SyncError {
    fn from(err: sea_orm::DbErr) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<ErpApiError> for SyncError {
    fn from(err: ErpApiError) -> Self {
        SyncError::Module(err.to_string())
    }
}
