//! Request/response bodies for the sync HTTP endpoints.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::sync::run::{
    ModuleProgress, RunLogEntry, RunStatus, SyncMode, SyncModule, SyncRun,
};

#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub tenant_id: String,
    pub mode: SyncMode,
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    /// Defaults to every module when omitted.
    #[serde(default)]
    pub modules: Option<Vec<SyncModule>>,
}

#[derive(Debug, Serialize)]
pub struct RunCreatedResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub modules: Vec<SyncModule>,
}

impl From<&SyncRun> for RunCreatedResponse {
    fn from(run: &SyncRun) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            modules: run.modules.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    pub run_id: Uuid,
    pub tenant_id: String,
    pub status: RunStatus,
    pub mode: SyncMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    pub modules: Vec<SyncModule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_module: Option<SyncModule>,
    pub progress: BTreeMap<SyncModule, ModuleProgress>,
    pub overall_progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<NaiveDateTime>,
    pub logs: Vec<RunLogEntry>,
}

impl RunStatusResponse {
    pub fn new(run: SyncRun, logs: Vec<RunLogEntry>) -> Self {
        Self {
            run_id: run.id,
            tenant_id: run.tenant_id.clone(),
            status: run.status,
            mode: run.mode,
            period_start: run.period_start,
            period_end: run.period_end,
            current_module: run.current_module(),
            overall_progress_percent: run.overall_progress_percent(),
            modules: run.modules.clone(),
            progress: run.progress.clone(),
            error_message: run.error_message.clone(),
            created_at: run.created_at,
            started_at: run.started_at,
            finished_at: run.finished_at,
            logs,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncErrorResponse {
    pub error: String,
}
