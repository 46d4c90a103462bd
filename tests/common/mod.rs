//! In-memory fakes for executor-level tests: run store, record store,
//! cache store and a scripted remote API. Everything is injected through
//! the same traits the SeaORM implementations satisfy, so the executor
//! under test is byte-for-byte the production one.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use erpsync_backend::models::erp::{InvoiceRecord, OrderRecord, ReceivableRecord};
use erpsync_backend::services::credentials::{ApiCredential, CredentialError, CredentialProvider};
use erpsync_backend::services::erp_api::{
    ErpApiError, ErpResource, PageFilters, PageResponse, RemoteApi,
};
use erpsync_backend::services::product_cache::{
    CacheStore, CachedRow, ProductCacheConfig, ProductCacheService, ProductInfo,
};
use erpsync_backend::services::rate_limiter::{RateLimiter, RateLimiterConfig};
use erpsync_backend::sync::executor::{ExecutorConfig, SyncExecutor};
use erpsync_backend::sync::processors::invoices::InvoicesProcessor;
use erpsync_backend::sync::processors::orders::OrdersProcessor;
use erpsync_backend::sync::processors::receivables::ReceivablesProcessor;
use erpsync_backend::sync::processors::ChunkProcessor;
use erpsync_backend::sync::records::RecordStore;
use erpsync_backend::sync::run::{RunLogEntry, SyncError, SyncModule, SyncRun};
use erpsync_backend::sync::store::RunStore;

// ---------------------------------------------------------------------------
// Run store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<HashMap<Uuid, SyncRun>>,
    logs: Mutex<Vec<(Uuid, RunLogEntry)>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: Uuid) -> Option<SyncRun> {
        self.runs.lock().get(&id).cloned()
    }

    /// Make a run look abandoned for staleness-sweep tests.
    pub fn backdate(&self, id: Uuid, minutes: i64) {
        if let Some(run) = self.runs.lock().get_mut(&id) {
            run.updated_at = Utc::now().naive_utc() - chrono::Duration::minutes(minutes);
        }
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn insert_run(&self, run: &SyncRun) -> Result<(), SyncError> {
        self.runs.lock().insert(run.id, run.clone());
        Ok(())
    }

    async fn load_run(&self, id: Uuid) -> Result<SyncRun, SyncError> {
        self.runs
            .lock()
            .get(&id)
            .cloned()
            .ok_or(SyncError::RunNotFound(id))
    }

    async fn try_acquire_step_lock(&self, id: Uuid) -> Result<bool, SyncError> {
        let mut runs = self.runs.lock();
        let run = runs.get_mut(&id).ok_or(SyncError::RunNotFound(id))?;
        if run.is_processing {
            return Ok(false);
        }
        run.is_processing = true;
        Ok(true)
    }

    async fn release_step_lock(&self, id: Uuid) -> Result<(), SyncError> {
        if let Some(run) = self.runs.lock().get_mut(&id) {
            run.is_processing = false;
        }
        Ok(())
    }

    async fn save_progress(&self, run: &SyncRun) -> Result<(), SyncError> {
        let mut runs = self.runs.lock();
        let stored = runs.get_mut(&run.id).ok_or(SyncError::RunNotFound(run.id))?;

        // Mirror the SQL implementation: everything but the lock bit.
        let is_processing = stored.is_processing;
        *stored = run.clone();
        stored.is_processing = is_processing;
        stored.updated_at = Utc::now().naive_utc();
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[erpsync_backend::sync::run::RunStatus],
        next: erpsync_backend::sync::run::RunStatus,
    ) -> Result<bool, SyncError> {
        let mut runs = self.runs.lock();
        let run = runs.get_mut(&id).ok_or(SyncError::RunNotFound(id))?;

        if !expected.contains(&run.status) {
            return Ok(false);
        }

        let now = Utc::now().naive_utc();
        run.status = next;
        run.updated_at = now;
        if next == erpsync_backend::sync::run::RunStatus::Running {
            run.started_at = Some(now);
        }
        if next.is_terminal() {
            run.finished_at = Some(now);
        }
        Ok(true)
    }

    async fn find_active_runs(&self) -> Result<Vec<SyncRun>, SyncError> {
        Ok(self
            .runs
            .lock()
            .values()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn find_stale_running(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<SyncRun>, SyncError> {
        Ok(self
            .runs
            .lock()
            .values()
            .filter(|r| {
                r.status == erpsync_backend::sync::run::RunStatus::Running
                    && r.updated_at < cutoff
            })
            .cloned()
            .collect())
    }

    async fn append_log(
        &self,
        run_id: Uuid,
        level: &str,
        module: Option<SyncModule>,
        message: &str,
    ) -> Result<(), SyncError> {
        self.logs.lock().push((
            run_id,
            RunLogEntry {
                logged_at: Utc::now().naive_utc(),
                level: level.to_string(),
                module: module.map(|m| m.as_str().to_string()),
                message: message.to_string(),
            },
        ));
        Ok(())
    }

    async fn recent_logs(&self, run_id: Uuid, limit: u64) -> Result<Vec<RunLogEntry>, SyncError> {
        let logs = self.logs.lock();
        let matching: Vec<RunLogEntry> = logs
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, entry)| entry.clone())
            .collect();

        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching.into_iter().skip(skip).collect())
    }
}

// ---------------------------------------------------------------------------
// Record store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRecordStore {
    pub invoices: Mutex<HashMap<(String, String), InvoiceRecord>>,
    pub receivables: Mutex<HashMap<(String, String), ReceivableRecord>>,
    pub orders: Mutex<HashMap<(String, String), OrderRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.lock().len()
    }

    pub fn receivable_count(&self) -> usize {
        self.receivables.lock().len()
    }

    pub fn order_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.orders.lock().keys().map(|(_, id)| id.clone()).collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert_invoice(&self, record: &InvoiceRecord) -> Result<(), SyncError> {
        self.invoices.lock().insert(
            (record.tenant_id.clone(), record.remote_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn upsert_receivable(&self, record: &ReceivableRecord) -> Result<(), SyncError> {
        self.receivables.lock().insert(
            (record.tenant_id.clone(), record.remote_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn upsert_order(&self, record: &OrderRecord) -> Result<(), SyncError> {
        self.orders.lock().insert(
            (record.tenant_id.clone(), record.remote_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn distinct_order_product_ids(
        &self,
        tenant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, SyncError> {
        let orders = self.orders.lock();
        let mut ids: Vec<String> = orders
            .values()
            .filter(|o| o.tenant_id == tenant_id)
            .filter(|o| o.order_date.map(|d| d >= start && d <= end).unwrap_or(false))
            .flat_map(|o| o.items.iter().filter_map(|i| i.product_id.clone()))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Cache store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCacheStore {
    rows: Mutex<HashMap<(String, String), CachedRow>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, tenant_id: &str, product_id: &str, category: &str) {
        self.rows.lock().insert(
            (tenant_id.to_string(), product_id.to_string()),
            CachedRow {
                product_id: product_id.to_string(),
                name: Some(format!("Product {}", product_id)),
                category: Some(category.to_string()),
                unit: None,
                pending: false,
                updated_at: Utc::now().naive_utc(),
            },
        );
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn fetch_rows(
        &self,
        tenant_id: &str,
        ids: &[String],
    ) -> Result<Vec<CachedRow>, SyncError> {
        let rows = self.rows.lock();
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(&(tenant_id.to_string(), id.clone())).cloned())
            .collect())
    }

    async fn upsert_row(&self, tenant_id: &str, info: &ProductInfo) -> Result<(), SyncError> {
        self.rows.lock().insert(
            (tenant_id.to_string(), info.product_id.clone()),
            CachedRow {
                product_id: info.product_id.clone(),
                name: info.name.clone(),
                category: info.category.clone(),
                unit: info.unit.clone(),
                pending: info.pending,
                updated_at: Utc::now().naive_utc(),
            },
        );
        Ok(())
    }

    async fn ensure_placeholder(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> Result<(), SyncError> {
        self.rows
            .lock()
            .entry((tenant_id.to_string(), product_id.to_string()))
            .or_insert_with(|| CachedRow {
                product_id: product_id.to_string(),
                name: None,
                category: None,
                unit: None,
                pending: true,
                updated_at: Utc::now().naive_utc(),
            });
        Ok(())
    }

    async fn find_pending(&self, limit: u64) -> Result<Vec<(String, String)>, SyncError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|(_, row)| row.pending)
            .take(limit as usize)
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn purge_older_than(&self, cutoff: NaiveDateTime) -> Result<u64, SyncError> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|_, row| row.updated_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Scripted remote API
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedApi {
    pages: Mutex<HashMap<ErpResource, Vec<Vec<serde_json::Value>>>>,
    details: Mutex<HashMap<(ErpResource, String), serde_json::Value>>,
    failing_pages: Mutex<Vec<(ErpResource, u32)>>,
    pub page_calls: AtomicU32,
    pub detail_calls: AtomicU32,
    detail_calls_by_id: Mutex<HashMap<String, u32>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pages(&self, resource: ErpResource, pages: Vec<Vec<serde_json::Value>>) {
        self.pages.lock().insert(resource, pages);
    }

    pub fn set_detail(&self, resource: ErpResource, id: &str, payload: serde_json::Value) {
        self.details.lock().insert((resource, id.to_string()), payload);
    }

    pub fn fail_page(&self, resource: ErpResource, page: u32) {
        self.failing_pages.lock().push((resource, page));
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn detail_calls_for(&self, id: &str) -> u32 {
        self.detail_calls_by_id
            .lock()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    async fn maybe_sleep(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteApi for ScriptedApi {
    async fn fetch_page(
        &self,
        _credential: &ApiCredential,
        resource: ErpResource,
        _filters: &PageFilters,
        page: u32,
    ) -> Result<PageResponse, ErpApiError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_sleep().await;

        if self.failing_pages.lock().contains(&(resource, page)) {
            return Err(ErpApiError::Api {
                status: 500,
                body: "remote listing blew up".to_string(),
            });
        }

        let pages = self.pages.lock();
        let resource_pages = pages.get(&resource).cloned().unwrap_or_default();
        let total_pages = resource_pages.len().max(1) as u32;
        let items = resource_pages
            .get(page.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default();

        Ok(PageResponse { items, total_pages })
    }

    async fn fetch_detail(
        &self,
        _credential: &ApiCredential,
        resource: ErpResource,
        id: &str,
    ) -> Result<serde_json::Value, ErpApiError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .detail_calls_by_id
            .lock()
            .entry(id.to_string())
            .or_insert(0) += 1;
        self.maybe_sleep().await;

        self.details
            .lock()
            .get(&(resource, id.to_string()))
            .cloned()
            .ok_or(ErpApiError::Api {
                status: 404,
                body: format!("no detail for {}", id),
            })
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

pub struct StaticCredentials;

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credential_for(&self, _tenant_id: &str) -> Result<ApiCredential, CredentialError> {
        Ok(ApiCredential::new("test-token"))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub executor: Arc<SyncExecutor>,
    pub run_store: Arc<MemoryRunStore>,
    pub record_store: Arc<MemoryRecordStore>,
    pub cache_store: Arc<MemoryCacheStore>,
    pub cache: Arc<ProductCacheService>,
    pub api: Arc<ScriptedApi>,
}

/// Assemble a production executor over in-memory fakes. Uses a private
/// unpaced limiter so tests never wait on real spacing.
pub fn build_harness(api: Arc<ScriptedApi>, orders_chunk_size: usize) -> Harness {
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        min_interval: Duration::ZERO,
        ..RateLimiterConfig::default()
    }));

    let run_store = Arc::new(MemoryRunStore::new());
    let record_store = Arc::new(MemoryRecordStore::new());
    let cache_store = Arc::new(MemoryCacheStore::new());

    let cache = Arc::new(ProductCacheService::new(
        cache_store.clone(),
        record_store.clone(),
        api.clone(),
        limiter.clone(),
        ProductCacheConfig::default(),
    ));

    let processors: Vec<Arc<dyn ChunkProcessor>> = vec![
        Arc::new(InvoicesProcessor::new(
            api.clone(),
            limiter.clone(),
            record_store.clone(),
        )),
        Arc::new(ReceivablesProcessor::new(
            api.clone(),
            limiter.clone(),
            record_store.clone(),
        )),
        Arc::new(
            OrdersProcessor::new(api.clone(), limiter, record_store.clone(), cache.clone())
                .with_chunk_size(orders_chunk_size),
        ),
    ];

    let executor = Arc::new(SyncExecutor::new(
        run_store.clone(),
        Arc::new(StaticCredentials),
        cache.clone(),
        processors,
        ExecutorConfig::default(),
    ));

    Harness {
        executor,
        run_store,
        record_store,
        cache_store,
        cache,
        api,
    }
}
