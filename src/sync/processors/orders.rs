//! Detail fan-out processor for sales orders.
//!
//! Order listings only carry ids; every record needs a detail fetch plus
//! product-category enrichment for its line items. The first chunk
//! snapshots the candidate id list for the run's window; subsequent chunks
//! work through a fixed-size slice each. Orders created remotely after the
//! snapshot are left for the next run — a bounded run beats a moving
//! target.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::erp::{extract_id, extract_order};
use crate::services::erp_api::{ErpResource, PageFilters, RemoteApi};
use crate::services::product_cache::ProductCacheService;
use crate::services::rate_limiter::RateLimiter;
use crate::sync::cursor::CursorState;
use crate::sync::processors::{ChunkContext, ChunkOutcome, ChunkProcessor};
use crate::sync::records::RecordStore;
use crate::sync::run::{SyncError, SyncModule};

const DEFAULT_CHUNK_SIZE: usize = 20;

pub struct OrdersProcessor {
    api: Arc<dyn RemoteApi>,
    limiter: Arc<RateLimiter>,
    records: Arc<dyn RecordStore>,
    cache: Arc<ProductCacheService>,
    chunk_size: usize,
}

impl OrdersProcessor {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        limiter: Arc<RateLimiter>,
        records: Arc<dyn RecordStore>,
        cache: Arc<ProductCacheService>,
    ) -> Self {
        Self {
            api,
            limiter,
            records,
            cache,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Snapshot every candidate order id in the window. The listing is
    /// paged remotely, but the whole id sweep is cheap enough to fit one
    /// chunk; details are what cost real time.
    async fn snapshot_candidates(&self, ctx: &ChunkContext) -> Result<Vec<String>, SyncError> {
        let filters = PageFilters {
            start_date: ctx.period_start,
            end_date: ctx.period_end,
        };

        let mut candidate_ids: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut page = 1;

        loop {
            let response = self
                .limiter
                .execute(|| {
                    self.api.fetch_page(
                        &ctx.credential,
                        ErpResource::SalesOrders,
                        &filters,
                        page,
                    )
                })
                .await?;

            if response.items.is_empty() {
                break;
            }

            for item in &response.items {
                if let Some(id) = item.get("id").and_then(extract_id) {
                    if seen.insert(id.clone()) {
                        candidate_ids.push(id);
                    }
                }
            }

            if page >= response.total_pages.max(1) {
                break;
            }
            page += 1;
        }

        tracing::info!(
            "Order snapshot for run {}: {} candidates",
            ctx.run_id,
            candidate_ids.len()
        );

        Ok(candidate_ids)
    }
}

#[async_trait]
impl ChunkProcessor for OrdersProcessor {
    fn module(&self) -> SyncModule {
        SyncModule::Orders
    }

    async fn process_chunk(
        &self,
        ctx: &ChunkContext,
        cursor: Option<CursorState>,
    ) -> Result<ChunkOutcome, SyncError> {
        let (candidate_ids, mut processed_ids) = match cursor {
            None => {
                // First chunk: take the snapshot, process nothing yet.
                let candidates = self.snapshot_candidates(ctx).await?;
                if candidates.is_empty() {
                    return Ok(ChunkOutcome::finished(0, 0, 0));
                }
                return Ok(ChunkOutcome::in_progress(
                    0,
                    0,
                    0,
                    CursorState::FanOut {
                        candidate_ids: candidates,
                        processed_ids: Vec::new(),
                    },
                ));
            }
            Some(CursorState::FanOut {
                candidate_ids,
                processed_ids,
            }) => (candidate_ids, processed_ids),
            Some(other) => {
                return Err(SyncError::BadCursor(format!(
                    "orders expects a fan-out cursor, got {:?}",
                    other
                )))
            }
        };

        let done_set: HashSet<&String> = processed_ids.iter().collect();
        let slice: Vec<String> = candidate_ids
            .iter()
            .filter(|id| !done_set.contains(id))
            .take(self.chunk_size)
            .cloned()
            .collect();

        let mut processed = 0;
        let mut skipped = 0;
        let mut errors = 0;

        // Fetch the slice's details first so the cache lookup can be one
        // batched call across every product id in the slice.
        let mut fetched = Vec::with_capacity(slice.len());
        for order_id in &slice {
            let payload = self
                .limiter
                .execute(|| {
                    self.api
                        .fetch_detail(&ctx.credential, ErpResource::SalesOrders, order_id)
                })
                .await?;

            match extract_order(&ctx.tenant_id, &payload) {
                Some(record) => fetched.push(record),
                None => {
                    tracing::warn!("Order {} detail had no usable id, skipping", order_id);
                    skipped += 1;
                }
            }
        }

        let product_ids: Vec<String> = fetched
            .iter()
            .flat_map(|order| order.items.iter().filter_map(|i| i.product_id.clone()))
            .collect();

        let resolved = self
            .cache
            .resolve(&ctx.tenant_id, &ctx.credential, &product_ids)
            .await?;

        for mut record in fetched {
            for item in &mut record.items {
                if let Some(product_id) = &item.product_id {
                    item.category = resolved
                        .get(product_id)
                        .and_then(|info| info.category_label().map(str::to_string));
                }
            }

            match self.records.upsert_order(&record).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    tracing::warn!("Failed to upsert order {}: {}", record.remote_id, e);
                    errors += 1;
                }
            }
        }

        // Every attempted id counts as worked through, including skips;
        // retrying a permanently bad record each chunk would stall the run.
        processed_ids.extend(slice);

        let done = processed_ids.len() >= candidate_ids.len();

        tracing::debug!(
            "Orders chunk: {}/{} candidates done, {} upserted, {} errors",
            processed_ids.len(),
            candidate_ids.len(),
            processed,
            errors
        );

        if done {
            Ok(ChunkOutcome::finished(processed, skipped, errors))
        } else {
            Ok(ChunkOutcome::in_progress(
                processed,
                skipped,
                errors,
                CursorState::FanOut {
                    candidate_ids,
                    processed_ids,
                },
            ))
        }
    }
}
