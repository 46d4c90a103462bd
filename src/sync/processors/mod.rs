//! Per-domain chunk processors.
//!
//! Each processor advances one bounded unit of work for its module, given
//! the cursor persisted by the previous step. Two shapes exist: paged
//! listings (invoices, receivables) and detail fan-out (orders).

pub mod invoices;
pub mod orders;
pub mod receivables;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::services::credentials::ApiCredential;
use crate::sync::cursor::CursorState;
use crate::sync::run::{SyncError, SyncMode, SyncModule};

/// Everything a processor needs about the run it is advancing.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub run_id: Uuid,
    pub tenant_id: String,
    pub credential: ApiCredential,
    pub mode: SyncMode,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

/// Outcome of one chunk. When `done` is false the cursor must carry enough
/// state that the next call resumes with no gaps and no duplicates.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub processed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub cursor: Option<CursorState>,
    pub done: bool,
}

impl ChunkOutcome {
    pub fn finished(processed: u64, skipped: u64, errors: u64) -> Self {
        Self {
            processed,
            skipped,
            errors,
            cursor: None,
            done: true,
        }
    }

    pub fn in_progress(processed: u64, skipped: u64, errors: u64, cursor: CursorState) -> Self {
        Self {
            processed,
            skipped,
            errors,
            cursor: Some(cursor),
            done: false,
        }
    }
}

#[async_trait]
pub trait ChunkProcessor: Send + Sync {
    fn module(&self) -> SyncModule;

    /// Advance one chunk. An `Err` here is module-fatal: the executor marks
    /// the module failed and the run FAILED. Per-record problems must be
    /// handled (skipped and counted) inside the processor instead.
    async fn process_chunk(
        &self,
        ctx: &ChunkContext,
        cursor: Option<CursorState>,
    ) -> Result<ChunkOutcome, SyncError>;
}
