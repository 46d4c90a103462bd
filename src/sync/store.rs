//! Durable storage for sync runs and their log trail.
//!
//! The executor only talks to the [`RunStore`] trait; the SeaORM
//! implementation below maps it onto the `sync_runs`/`sync_run_logs`
//! tables. The step lock is a single conditional update
//! (`set is_processing=true where is_processing=false`), which is the only
//! mutual-exclusion primitive the executor relies on.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::{prelude::*, sync_run_logs, sync_runs};
use crate::sync::cursor::CursorEnvelope;
use crate::sync::run::{
    ModuleProgress, RunLogEntry, RunStatus, SyncError, SyncMode, SyncModule, SyncRun,
};

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn insert_run(&self, run: &SyncRun) -> Result<(), SyncError>;

    async fn load_run(&self, id: Uuid) -> Result<SyncRun, SyncError>;

    /// The lock primitive: atomically flips `is_processing` false→true.
    /// Returns false when another step already holds the lock.
    async fn try_acquire_step_lock(&self, id: Uuid) -> Result<bool, SyncError>;

    async fn release_step_lock(&self, id: Uuid) -> Result<(), SyncError>;

    /// Persist everything one step mutates (status, module index, cursor,
    /// progress, error, timestamps). Never touches `is_processing`.
    async fn save_progress(&self, run: &SyncRun) -> Result<(), SyncError>;

    /// Conditional status transition; returns false when the run was not
    /// in one of the expected states.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[RunStatus],
        next: RunStatus,
    ) -> Result<bool, SyncError>;

    async fn find_active_runs(&self) -> Result<Vec<SyncRun>, SyncError>;

    /// RUNNING runs whose last persisted progress predates `cutoff`.
    async fn find_stale_running(&self, cutoff: NaiveDateTime)
        -> Result<Vec<SyncRun>, SyncError>;

    async fn append_log(
        &self,
        run_id: Uuid,
        level: &str,
        module: Option<SyncModule>,
        message: &str,
    ) -> Result<(), SyncError>;

    /// Most recent `limit` entries, oldest first.
    async fn recent_logs(&self, run_id: Uuid, limit: u64) -> Result<Vec<RunLogEntry>, SyncError>;
}

pub struct SeaOrmRunStore {
    db: DatabaseConnection,
}

impl SeaOrmRunStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn to_domain(model: sync_runs::Model) -> Result<SyncRun, SyncError> {
        let status = RunStatus::parse(&model.status)
            .ok_or_else(|| SyncError::Store(format!("unknown run status {:?}", model.status)))?;
        let mode = SyncMode::parse(&model.mode)
            .ok_or_else(|| SyncError::Store(format!("unknown run mode {:?}", model.mode)))?;

        let modules: Vec<SyncModule> = serde_json::from_value(model.modules)
            .map_err(|e| SyncError::Store(format!("corrupt modules list: {}", e)))?;
        let progress: std::collections::BTreeMap<SyncModule, ModuleProgress> =
            serde_json::from_value(model.progress)
                .map_err(|e| SyncError::Store(format!("corrupt progress map: {}", e)))?;

        let cursor = match model.cursor {
            Some(value) if !value.is_null() => Some(CursorEnvelope::decode(&value)?),
            _ => None,
        };

        Ok(SyncRun {
            id: model.id,
            tenant_id: model.tenant_id,
            status,
            mode,
            period_start: model.period_start,
            period_end: model.period_end,
            modules,
            module_index: model.module_index.max(0) as usize,
            cursor,
            progress,
            is_processing: model.is_processing,
            error_message: model.error_message,
            created_at: model.created_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
            updated_at: model.updated_at,
        })
    }

    fn encode_json<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value, SyncError> {
        serde_json::to_value(value)
            .map_err(|e| SyncError::Store(format!("failed to encode {}: {}", what, e)))
    }
}

#[async_trait]
impl RunStore for SeaOrmRunStore {
    async fn insert_run(&self, run: &SyncRun) -> Result<(), SyncError> {
        let model = sync_runs::ActiveModel {
            id: Set(run.id),
            tenant_id: Set(run.tenant_id.clone()),
            status: Set(run.status.as_str().to_string()),
            mode: Set(run.mode.as_str().to_string()),
            period_start: Set(run.period_start),
            period_end: Set(run.period_end),
            modules: Set(Self::encode_json(&run.modules, "modules")?),
            module_index: Set(run.module_index as i32),
            cursor: Set(run.cursor.as_ref().map(|c| c.encode())),
            progress: Set(Self::encode_json(&run.progress, "progress")?),
            is_processing: Set(false),
            error_message: Set(run.error_message.clone()),
            created_at: Set(run.created_at),
            started_at: Set(run.started_at),
            finished_at: Set(run.finished_at),
            updated_at: Set(run.updated_at),
        };

        model.insert(&self.db).await?;
        Ok(())
    }

    async fn load_run(&self, id: Uuid) -> Result<SyncRun, SyncError> {
        let model = SyncRuns::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(SyncError::RunNotFound(id))?;

        Self::to_domain(model)
    }

    async fn try_acquire_step_lock(&self, id: Uuid) -> Result<bool, SyncError> {
        let result = SyncRuns::update_many()
            .col_expr(sync_runs::Column::IsProcessing, Expr::value(true))
            .filter(sync_runs::Column::Id.eq(id))
            .filter(sync_runs::Column::IsProcessing.eq(false))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn release_step_lock(&self, id: Uuid) -> Result<(), SyncError> {
        SyncRuns::update_many()
            .col_expr(sync_runs::Column::IsProcessing, Expr::value(false))
            .filter(sync_runs::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn save_progress(&self, run: &SyncRun) -> Result<(), SyncError> {
        let now = Utc::now().naive_utc();

        SyncRuns::update_many()
            .col_expr(
                sync_runs::Column::Status,
                Expr::value(run.status.as_str().to_string()),
            )
            .col_expr(
                sync_runs::Column::ModuleIndex,
                Expr::value(run.module_index as i32),
            )
            .col_expr(
                sync_runs::Column::Cursor,
                Expr::value(run.cursor.as_ref().map(|c| c.encode())),
            )
            .col_expr(
                sync_runs::Column::Progress,
                Expr::value(Self::encode_json(&run.progress, "progress")?),
            )
            .col_expr(
                sync_runs::Column::ErrorMessage,
                Expr::value(run.error_message.clone()),
            )
            .col_expr(sync_runs::Column::StartedAt, Expr::value(run.started_at))
            .col_expr(sync_runs::Column::FinishedAt, Expr::value(run.finished_at))
            .col_expr(sync_runs::Column::UpdatedAt, Expr::value(now))
            .filter(sync_runs::Column::Id.eq(run.id))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[RunStatus],
        next: RunStatus,
    ) -> Result<bool, SyncError> {
        let now = Utc::now().naive_utc();
        let expected_strs: Vec<String> =
            expected.iter().map(|s| s.as_str().to_string()).collect();

        let mut update = SyncRuns::update_many()
            .col_expr(
                sync_runs::Column::Status,
                Expr::value(next.as_str().to_string()),
            )
            .col_expr(sync_runs::Column::UpdatedAt, Expr::value(now));

        if next == RunStatus::Running {
            update = update.col_expr(sync_runs::Column::StartedAt, Expr::value(Some(now)));
        }
        if next.is_terminal() {
            update = update.col_expr(sync_runs::Column::FinishedAt, Expr::value(Some(now)));
        }

        let result = update
            .filter(sync_runs::Column::Id.eq(id))
            .filter(sync_runs::Column::Status.is_in(expected_strs))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn find_active_runs(&self) -> Result<Vec<SyncRun>, SyncError> {
        let models = SyncRuns::find()
            .filter(sync_runs::Column::Status.is_in(vec![
                RunStatus::Queued.as_str(),
                RunStatus::Running.as_str(),
            ]))
            .order_by_asc(sync_runs::Column::CreatedAt)
            .all(&self.db)
            .await?;

        models.into_iter().map(Self::to_domain).collect()
    }

    async fn find_stale_running(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<SyncRun>, SyncError> {
        let models = SyncRuns::find()
            .filter(sync_runs::Column::Status.eq(RunStatus::Running.as_str()))
            .filter(sync_runs::Column::UpdatedAt.lt(cutoff))
            .all(&self.db)
            .await?;

        models.into_iter().map(Self::to_domain).collect()
    }

    async fn append_log(
        &self,
        run_id: Uuid,
        level: &str,
        module: Option<SyncModule>,
        message: &str,
    ) -> Result<(), SyncError> {
        let entry = sync_run_logs::ActiveModel {
            run_id: Set(run_id),
            logged_at: Set(Utc::now().naive_utc()),
            level: Set(level.to_string()),
            module: Set(module.map(|m| m.as_str().to_string())),
            message: Set(message.to_string()),
            ..Default::default()
        };

        entry.insert(&self.db).await?;
        Ok(())
    }

    async fn recent_logs(&self, run_id: Uuid, limit: u64) -> Result<Vec<RunLogEntry>, SyncError> {
        let mut models = SyncRunLogs::find()
            .filter(sync_run_logs::Column::RunId.eq(run_id))
            .order_by_desc(sync_run_logs::Column::LoggedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        models.reverse();

        Ok(models
            .into_iter()
            .map(|m| RunLogEntry {
                logged_at: m.logged_at,
                level: m.level,
                module: m.module,
                message: m.message,
            })
            .collect())
    }
}
