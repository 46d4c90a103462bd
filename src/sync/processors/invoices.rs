//! Paged-listing processor for invoices.

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::erp::extract_invoice;
use crate::services::erp_api::{ErpResource, PageFilters, RemoteApi};
use crate::services::rate_limiter::RateLimiter;
use crate::sync::cursor::CursorState;
use crate::sync::processors::{ChunkContext, ChunkOutcome, ChunkProcessor};
use crate::sync::records::RecordStore;
use crate::sync::run::{SyncError, SyncModule};

pub struct InvoicesProcessor {
    api: Arc<dyn RemoteApi>,
    limiter: Arc<RateLimiter>,
    records: Arc<dyn RecordStore>,
}

impl InvoicesProcessor {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        limiter: Arc<RateLimiter>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            api,
            limiter,
            records,
        }
    }
}

#[async_trait]
impl ChunkProcessor for InvoicesProcessor {
    fn module(&self) -> SyncModule {
        SyncModule::Invoices
    }

    async fn process_chunk(
        &self,
        ctx: &ChunkContext,
        cursor: Option<CursorState>,
    ) -> Result<ChunkOutcome, SyncError> {
        let (page, known_total) = match cursor {
            None => (1, None),
            Some(CursorState::Paged { page, total_pages }) => (page, total_pages),
            Some(other) => {
                return Err(SyncError::BadCursor(format!(
                    "invoices expects a paged cursor, got {:?}",
                    other
                )))
            }
        };

        let filters = PageFilters {
            start_date: ctx.period_start,
            end_date: ctx.period_end,
        };

        let response = self
            .limiter
            .execute(|| {
                self.api
                    .fetch_page(&ctx.credential, ErpResource::Invoices, &filters, page)
            })
            .await?;

        let mut processed = 0;
        let mut skipped = 0;
        let mut errors = 0;

        for item in &response.items {
            let Some(record) = extract_invoice(&ctx.tenant_id, item) else {
                tracing::warn!("Invoice on page {} without usable id, skipping", page);
                skipped += 1;
                continue;
            };

            match self.records.upsert_invoice(&record).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    tracing::warn!("Failed to upsert invoice {}: {}", record.remote_id, e);
                    errors += 1;
                }
            }
        }

        // Trust the first-seen page count; remote re-counts can shrink
        // mid-run and would otherwise skip tail pages.
        let total_pages = known_total.unwrap_or(response.total_pages).max(1);
        let done = response.items.is_empty() || page >= total_pages;

        tracing::debug!(
            "Invoices page {}/{}: {} upserted, {} skipped, {} errors",
            page,
            total_pages,
            processed,
            skipped,
            errors
        );

        if done {
            Ok(ChunkOutcome::finished(processed, skipped, errors))
        } else {
            Ok(ChunkOutcome::in_progress(
                processed,
                skipped,
                errors,
                CursorState::Paged {
                    page: page + 1,
                    total_pages: Some(total_pages),
                },
            ))
        }
    }
}
