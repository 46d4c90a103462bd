//! Module-specific resumption state, persisted between steps.
//!
//! Cursors are stored as a versioned envelope so a schema change never gets
//! silently misread mid-run: an unknown version or shape fails decoding
//! loudly and the run surfaces the error instead of skipping records.

use serde::{Deserialize, Serialize};

use crate::sync::run::SyncError;

pub const CURSOR_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorEnvelope {
    pub version: u32,
    pub state: CursorState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CursorState {
    /// Paged-listing modules: next page to fetch. `total_pages` is the
    /// remote's count as of the first page, kept for progress reporting.
    Paged {
        page: u32,
        total_pages: Option<u32>,
    },
    /// Detail fan-out modules: the candidate snapshot taken on the first
    /// chunk, plus everything already worked through.
    FanOut {
        candidate_ids: Vec<String>,
        processed_ids: Vec<String>,
    },
}

impl CursorEnvelope {
    pub fn new(state: CursorState) -> Self {
        Self {
            version: CURSOR_VERSION,
            state,
        }
    }

    pub fn decode(value: &serde_json::Value) -> Result<Self, SyncError> {
        let envelope: CursorEnvelope = serde_json::from_value(value.clone())
            .map_err(|e| SyncError::BadCursor(e.to_string()))?;

        if envelope.version != CURSOR_VERSION {
            return Err(SyncError::BadCursor(format!(
                "unsupported cursor version {}",
                envelope.version
            )));
        }

        Ok(envelope)
    }

    pub fn encode(&self) -> serde_json::Value {
        // Both variants are plain data; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
