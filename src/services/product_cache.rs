//! Cache-aside store for product metadata referenced by order line items.
//!
//! Bulk order payloads carry product ids but not the descriptive fields the
//! reports need, and fetching every product detail during a sync would eat
//! the rate limit. The cache keeps those slow-changing fields in Postgres
//! with a moka hot layer in front, and enrichment fetches are capped by a
//! per-call budget; whatever does not fit the budget is written back as a
//! pending placeholder so downstream transformers always find a key.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};
use moka::future::Cache;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::entities::{prelude::*, product_cache};
use crate::models::erp::extract_product;
use crate::services::credentials::ApiCredential;
use crate::services::erp_api::{ErpResource, RemoteApi};
use crate::services::rate_limiter::RateLimiter;
use crate::sync::records::RecordStore;
use crate::sync::run::SyncError;

/// Descriptive product fields as seen by transformers. `pending=true`
/// means the cache has only a placeholder so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub product_id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub pending: bool,
}

impl ProductInfo {
    pub fn placeholder(product_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            name: None,
            category: None,
            unit: None,
            pending: true,
        }
    }

    pub fn category_label(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct CachedRow {
    pub product_id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub pending: bool,
    pub updated_at: NaiveDateTime,
}

impl CachedRow {
    fn info(&self) -> ProductInfo {
        ProductInfo {
            product_id: self.product_id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            unit: self.unit.clone(),
            pending: self.pending,
        }
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn fetch_rows(
        &self,
        tenant_id: &str,
        ids: &[String],
    ) -> Result<Vec<CachedRow>, SyncError>;

    /// Insert or refresh a fully-populated row; bumps `updated_at`.
    async fn upsert_row(&self, tenant_id: &str, info: &ProductInfo) -> Result<(), SyncError>;

    /// Write a pending placeholder only when no row exists yet, so a
    /// budget-skip never clobbers previously fetched fields.
    async fn ensure_placeholder(&self, tenant_id: &str, product_id: &str)
        -> Result<(), SyncError>;

    /// Placeholder rows eligible for the background sweep, oldest first.
    async fn find_pending(&self, limit: u64) -> Result<Vec<(String, String)>, SyncError>;

    async fn purge_older_than(&self, cutoff: NaiveDateTime) -> Result<u64, SyncError>;
}

#[derive(Debug, Clone)]
pub struct ProductCacheConfig {
    /// Rows older than this are treated as misses.
    pub stale_after: ChronoDuration,
    /// Rows not refreshed for this long get purged by maintenance.
    pub purge_after: ChronoDuration,
    /// Detail fetches allowed per enrich call.
    pub max_enrich: usize,
    /// Hard wall for the synchronous pre-warm.
    pub prewarm_timeout: Duration,
    pub prewarm_sample_days: i64,
    /// Warm only when the extrapolated entity count is below
    /// `prewarm_budget_factor * max_enrich`.
    pub prewarm_budget_factor: u64,
}

impl Default for ProductCacheConfig {
    fn default() -> Self {
        Self {
            stale_after: ChronoDuration::days(30),
            purge_after: ChronoDuration::days(180),
            max_enrich: 10,
            prewarm_timeout: Duration::from_secs(30),
            prewarm_sample_days: 7,
            prewarm_budget_factor: 3,
        }
    }
}

/// Result of the batched read path.
#[derive(Debug, Default)]
pub struct CacheLookup {
    pub cached: HashMap<String, ProductInfo>,
    pub missing: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PrewarmOutcome {
    Warmed { enriched: usize },
    Skipped { estimated: u64 },
    TimedOut,
}

pub struct ProductCacheService {
    store: Arc<dyn CacheStore>,
    records: Arc<dyn RecordStore>,
    api: Arc<dyn RemoteApi>,
    limiter: Arc<RateLimiter>,
    hot: Cache<(String, String), ProductInfo>,
    config: ProductCacheConfig,
}

impl ProductCacheService {
    pub fn new(
        store: Arc<dyn CacheStore>,
        records: Arc<dyn RecordStore>,
        api: Arc<dyn RemoteApi>,
        limiter: Arc<RateLimiter>,
        config: ProductCacheConfig,
    ) -> Self {
        let hot = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(300))
            .build();

        Self {
            store,
            records,
            api,
            limiter,
            hot,
            config,
        }
    }

    pub fn max_enrich(&self) -> usize {
        self.config.max_enrich
    }

    /// Batched read path: one store query, zero network calls.
    pub async fn lookup(&self, tenant_id: &str, ids: &[String]) -> Result<CacheLookup, SyncError> {
        let mut unique: Vec<String> = Vec::new();
        let mut seen: HashSet<&String> = HashSet::new();
        for id in ids {
            if seen.insert(id) {
                unique.push(id.clone());
            }
        }

        let mut result = CacheLookup::default();
        let mut to_query: Vec<String> = Vec::new();

        for id in unique {
            let key = (tenant_id.to_string(), id.clone());
            match self.hot.get(&key).await {
                Some(info) => {
                    result.cached.insert(id, info);
                }
                None => to_query.push(id),
            }
        }

        if to_query.is_empty() {
            return Ok(result);
        }

        let fresh_after = Utc::now().naive_utc() - self.config.stale_after;
        let rows = self.store.fetch_rows(tenant_id, &to_query).await?;
        let by_id: HashMap<&str, &CachedRow> =
            rows.iter().map(|r| (r.product_id.as_str(), r)).collect();

        for id in to_query {
            match by_id.get(id.as_str()) {
                Some(row) if !row.pending && row.updated_at >= fresh_after => {
                    let info = row.info();
                    self.hot
                        .insert((tenant_id.to_string(), id.clone()), info.clone())
                        .await;
                    result.cached.insert(id, info);
                }
                // Absent, pending or stale: all count as misses
                _ => result.missing.push(id),
            }
        }

        Ok(result)
    }

    /// Fetch up to `budget` of `missing` through the rate limiter and write
    /// them back. Every input id gets an entry in the returned map; ids
    /// beyond the budget or whose fetch failed come back as placeholders.
    pub async fn enrich(
        &self,
        tenant_id: &str,
        credential: &ApiCredential,
        missing: &[String],
        budget: usize,
    ) -> Result<HashMap<String, ProductInfo>, SyncError> {
        let mut out: HashMap<String, ProductInfo> = HashMap::new();

        for (position, product_id) in missing.iter().enumerate() {
            if position >= budget {
                self.write_placeholder(tenant_id, product_id).await;
                out.insert(product_id.clone(), ProductInfo::placeholder(product_id));
                continue;
            }

            let fetched = self
                .limiter
                .execute(|| {
                    self.api
                        .fetch_detail(credential, ErpResource::Products, product_id)
                })
                .await;

            match fetched.map(|payload| extract_product(&payload)) {
                Ok(Some(product)) => {
                    let info = ProductInfo {
                        product_id: product_id.clone(),
                        name: product.name,
                        category: product.category,
                        unit: product.unit,
                        pending: false,
                    };
                    self.store.upsert_row(tenant_id, &info).await?;
                    self.hot
                        .insert((tenant_id.to_string(), product_id.clone()), info.clone())
                        .await;
                    out.insert(product_id.clone(), info);
                }
                Ok(None) => {
                    tracing::warn!("Product {} payload had no usable id, caching placeholder", product_id);
                    self.write_placeholder(tenant_id, product_id).await;
                    out.insert(product_id.clone(), ProductInfo::placeholder(product_id));
                }
                Err(e) => {
                    tracing::warn!("Failed to enrich product {}: {}", product_id, e);
                    self.write_placeholder(tenant_id, product_id).await;
                    out.insert(product_id.clone(), ProductInfo::placeholder(product_id));
                }
            }
        }

        Ok(out)
    }

    async fn write_placeholder(&self, tenant_id: &str, product_id: &str) {
        if let Err(e) = self.store.ensure_placeholder(tenant_id, product_id).await {
            tracing::warn!("Failed to store placeholder for {}: {}", product_id, e);
        }
    }

    /// Processor-facing path: batched read, budgeted enrich, merged map
    /// covering every requested id.
    pub async fn resolve(
        &self,
        tenant_id: &str,
        credential: &ApiCredential,
        ids: &[String],
    ) -> Result<HashMap<String, ProductInfo>, SyncError> {
        let lookup = self.lookup(tenant_id, ids).await?;
        let mut resolved = lookup.cached;

        if !lookup.missing.is_empty() {
            let enriched = self
                .enrich(tenant_id, credential, &lookup.missing, self.config.max_enrich)
                .await?;
            resolved.extend(enriched);
        }

        Ok(resolved)
    }

    /// Period-sync warm-up: extrapolate the distinct-product count for the
    /// window from the trailing sample of already-mirrored orders, and only
    /// warm synchronously when the estimate is small enough to fit the
    /// budget. Anything larger is left to steady-state per-chunk enrichment
    /// and the background sweep.
    pub async fn prewarm_for_period(
        &self,
        tenant_id: &str,
        credential: &ApiCredential,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PrewarmOutcome, SyncError> {
        let total_days = (end - start).num_days().max(1) as u64;
        let sample_start = std::cmp::max(
            start,
            end - ChronoDuration::days(self.config.prewarm_sample_days),
        );
        let sample_days = (end - sample_start).num_days().max(1) as u64;

        let sample_ids = self
            .records
            .distinct_order_product_ids(tenant_id, sample_start, end)
            .await?;

        if sample_ids.is_empty() {
            return Ok(PrewarmOutcome::Skipped { estimated: 0 });
        }

        let estimated = sample_ids.len() as u64 * total_days / sample_days;
        let ceiling = self.config.prewarm_budget_factor * self.config.max_enrich as u64;

        if estimated > ceiling {
            tracing::info!(
                "Skipping cache pre-warm for {}: ~{} distinct products (ceiling {})",
                tenant_id,
                estimated,
                ceiling
            );
            return Ok(PrewarmOutcome::Skipped { estimated });
        }

        let lookup = self.lookup(tenant_id, &sample_ids).await?;
        if lookup.missing.is_empty() {
            return Ok(PrewarmOutcome::Warmed { enriched: 0 });
        }

        match tokio::time::timeout(
            self.config.prewarm_timeout,
            self.enrich(tenant_id, credential, &lookup.missing, self.config.max_enrich),
        )
        .await
        {
            Ok(enriched) => {
                let enriched = enriched?;
                let fetched = enriched.values().filter(|i| !i.pending).count();
                tracing::info!("Pre-warmed {} products for {}", fetched, tenant_id);
                Ok(PrewarmOutcome::Warmed { enriched: fetched })
            }
            Err(_) => {
                tracing::warn!("Cache pre-warm for {} hit the hard timeout, proceeding", tenant_id);
                Ok(PrewarmOutcome::TimedOut)
            }
        }
    }

    /// Placeholder rows the background sweep should retry, oldest first.
    pub async fn pending_entries(&self, limit: u64) -> Result<Vec<(String, String)>, SyncError> {
        self.store.find_pending(limit).await
    }

    /// Drop rows unused (not refreshed) beyond the purge threshold.
    pub async fn purge_unused(&self) -> Result<u64, SyncError> {
        let cutoff = Utc::now().naive_utc() - self.config.purge_after;
        let purged = self.store.purge_older_than(cutoff).await?;
        if purged > 0 {
            tracing::info!("Purged {} unused product cache rows", purged);
        }
        Ok(purged)
    }
}

pub struct SeaOrmCacheStore {
    db: DatabaseConnection,
}

impl SeaOrmCacheStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CacheStore for SeaOrmCacheStore {
    async fn fetch_rows(
        &self,
        tenant_id: &str,
        ids: &[String],
    ) -> Result<Vec<CachedRow>, SyncError> {
        let rows = ProductCache::find()
            .filter(product_cache::Column::TenantId.eq(tenant_id))
            .filter(product_cache::Column::ProductId.is_in(ids.to_vec()))
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|m| CachedRow {
                product_id: m.product_id,
                name: m.name,
                category: m.category,
                unit: m.unit,
                pending: m.pending,
                updated_at: m.updated_at,
            })
            .collect())
    }

    async fn upsert_row(&self, tenant_id: &str, info: &ProductInfo) -> Result<(), SyncError> {
        let now = Utc::now().naive_utc();

        let existing = ProductCache::find()
            .filter(product_cache::Column::TenantId.eq(tenant_id))
            .filter(product_cache::Column::ProductId.eq(&info.product_id))
            .one(&self.db)
            .await?;

        match existing {
            Some(row) => {
                let mut model: product_cache::ActiveModel = row.into();
                model.name = Set(info.name.clone());
                model.category = Set(info.category.clone());
                model.unit = Set(info.unit.clone());
                model.pending = Set(info.pending);
                model.updated_at = Set(now);
                model.update(&self.db).await?;
            }
            None => {
                let model = product_cache::ActiveModel {
                    tenant_id: Set(tenant_id.to_string()),
                    product_id: Set(info.product_id.clone()),
                    name: Set(info.name.clone()),
                    category: Set(info.category.clone()),
                    unit: Set(info.unit.clone()),
                    pending: Set(info.pending),
                    updated_at: Set(now),
                    ..Default::default()
                };
                model.insert(&self.db).await?;
            }
        }

        Ok(())
    }

    async fn ensure_placeholder(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> Result<(), SyncError> {
        let existing = ProductCache::find()
            .filter(product_cache::Column::TenantId.eq(tenant_id))
            .filter(product_cache::Column::ProductId.eq(product_id))
            .one(&self.db)
            .await?;

        if existing.is_some() {
            return Ok(());
        }

        let model = product_cache::ActiveModel {
            tenant_id: Set(tenant_id.to_string()),
            product_id: Set(product_id.to_string()),
            name: Set(None),
            category: Set(None),
            unit: Set(None),
            pending: Set(true),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        model.insert(&self.db).await?;

        Ok(())
    }

    async fn find_pending(&self, limit: u64) -> Result<Vec<(String, String)>, SyncError> {
        let rows = ProductCache::find()
            .filter(product_cache::Column::Pending.eq(true))
            .order_by_asc(product_cache::Column::UpdatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|m| (m.tenant_id, m.product_id))
            .collect())
    }

    async fn purge_older_than(&self, cutoff: NaiveDateTime) -> Result<u64, SyncError> {
        let result = ProductCache::delete_many()
            .filter(product_cache::Column::UpdatedAt.lt(cutoff))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::erp_api::{ErpApiError, PageFilters, PageResponse};
    use crate::services::rate_limiter::RateLimiterConfig;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MemoryCacheStore {
        rows: Mutex<HashMap<(String, String), CachedRow>>,
    }

    impl MemoryCacheStore {
        fn new() -> Self {
            Self {
                rows: Mutex::new(HashMap::new()),
            }
        }

        fn seed(&self, tenant: &str, id: &str, category: &str, age_days: i64) {
            self.rows.lock().insert(
                (tenant.to_string(), id.to_string()),
                CachedRow {
                    product_id: id.to_string(),
                    name: Some(format!("Product {}", id)),
                    category: Some(category.to_string()),
                    unit: None,
                    pending: false,
                    updated_at: Utc::now().naive_utc() - ChronoDuration::days(age_days),
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

    struct CountingApi {
        calls: AtomicU32,
    }

    impl CountingApi {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteApi for CountingApi {
        async fn fetch_page(
            &self,
            _credential: &ApiCredential,
            _resource: ErpResource,
            _filters: &PageFilters,
            _page: u32,
        ) -> Result<PageResponse, ErpApiError> {
            Ok(PageResponse {
                items: vec![],
                total_pages: 1,
            })
        }

        async fn fetch_detail(
            &self,
            _credential: &ApiCredential,
            _resource: ErpResource,
            id: &str,
        ) -> Result<serde_json::Value, ErpApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"id": id, "name": format!("Product {}", id), "category": "Hardware"}))
        }
    }

    /// Record store that only answers the distinct-product query.
    struct SampleRecordStore {
        product_ids: Vec<String>,
    }

    impl SampleRecordStore {
        fn empty() -> Self {
            Self {
                product_ids: vec![],
            }
        }

        fn with_products(ids: &[&str]) -> Self {
            Self {
                product_ids: ids.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl RecordStore for SampleRecordStore {
        async fn upsert_invoice(
            &self,
            _record: &crate::models::erp::InvoiceRecord,
        ) -> Result<(), SyncError> {
            Ok(())
        }

        async fn upsert_receivable(
            &self,
            _record: &crate::models::erp::ReceivableRecord,
        ) -> Result<(), SyncError> {
            Ok(())
        }

        async fn upsert_order(
            &self,
            _record: &crate::models::erp::OrderRecord,
        ) -> Result<(), SyncError> {
            Ok(())
        }

        async fn distinct_order_product_ids(
            &self,
            _tenant_id: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<String>, SyncError> {
            Ok(self.product_ids.clone())
        }
    }

    fn fast_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(RateLimiterConfig {
            min_interval: Duration::ZERO,
            ..RateLimiterConfig::default()
        }))
    }

    fn service(
        store: Arc<MemoryCacheStore>,
        api: Arc<CountingApi>,
        max_enrich: usize,
    ) -> ProductCacheService {
        service_with_records(store, api, max_enrich, SampleRecordStore::empty())
    }

    fn service_with_records(
        store: Arc<MemoryCacheStore>,
        api: Arc<CountingApi>,
        max_enrich: usize,
        records: SampleRecordStore,
    ) -> ProductCacheService {
        ProductCacheService::new(
            store,
            Arc::new(records),
            api,
            fast_limiter(),
            ProductCacheConfig {
                max_enrich,
                ..ProductCacheConfig::default()
            },
        )
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn lookup_issues_zero_network_calls() {
        let store = Arc::new(MemoryCacheStore::new());
        store.seed("t1", "p1", "Hardware", 1);
        store.seed("t1", "p2", "Software", 1);
        let api = Arc::new(CountingApi::new());
        let cache = service(Arc::clone(&store), Arc::clone(&api), 10);

        let lookup = cache
            .lookup("t1", &ids(&["p1", "p2", "p3"]))
            .await
            .unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert_eq!(lookup.cached.len(), 2);
        assert_eq!(lookup.missing, vec!["p3".to_string()]);
    }

    #[tokio::test]
    async fn stale_rows_count_as_misses() {
        let store = Arc::new(MemoryCacheStore::new());
        store.seed("t1", "fresh", "Hardware", 1);
        store.seed("t1", "old", "Hardware", 45);
        let api = Arc::new(CountingApi::new());
        let cache = service(Arc::clone(&store), api, 10);

        let lookup = cache.lookup("t1", &ids(&["fresh", "old"])).await.unwrap();

        assert!(lookup.cached.contains_key("fresh"));
        assert_eq!(lookup.missing, vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn enrich_respects_budget_exactly() {
        let store = Arc::new(MemoryCacheStore::new());
        let api = Arc::new(CountingApi::new());
        let cache = service(Arc::clone(&store), Arc::clone(&api), 2);
        let cred = ApiCredential::new("token");

        let missing = ids(&["p1", "p2", "p3", "p4", "p5"]);
        let enriched = cache.enrich("t1", &cred, &missing, 2).await.unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
        assert_eq!(enriched.len(), 5);
        assert_eq!(enriched.values().filter(|i| !i.pending).count(), 2);
        assert_eq!(enriched.values().filter(|i| i.pending).count(), 3);

        // The over-budget ids are placeholder rows, still misses next time
        let lookup = cache.lookup("t1", &missing).await.unwrap();
        assert_eq!(lookup.cached.len(), 2);
        assert_eq!(lookup.missing.len(), 3);
    }

    #[tokio::test]
    async fn prewarm_warms_small_windows() {
        let store = Arc::new(MemoryCacheStore::new());
        let api = Arc::new(CountingApi::new());
        let cache = service_with_records(
            Arc::clone(&store),
            Arc::clone(&api),
            2,
            SampleRecordStore::with_products(&["p1", "p2"]),
        );
        let cred = ApiCredential::new("token");

        // 5-day window, 2 sampled products -> estimate 2, under the
        // 3 * max_enrich ceiling
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let outcome = cache
            .prewarm_for_period("t1", &cred, start, end)
            .await
            .unwrap();

        assert_eq!(outcome, PrewarmOutcome::Warmed { enriched: 2 });
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);

        // warmed entries are cache hits now
        let lookup = cache.lookup("t1", &ids(&["p1", "p2"])).await.unwrap();
        assert!(lookup.missing.is_empty());
    }

    #[tokio::test]
    async fn prewarm_skips_when_estimate_exceeds_ceiling() {
        let store = Arc::new(MemoryCacheStore::new());
        let api = Arc::new(CountingApi::new());
        let cache = service_with_records(
            Arc::clone(&store),
            Arc::clone(&api),
            2,
            SampleRecordStore::with_products(&["a", "b", "c", "d", "e", "f", "g"]),
        );
        let cred = ApiCredential::new("token");

        // 60-day window sampled over 7 days: 7 * 60/7 = 60 products
        // estimated, way over the ceiling of 6
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let outcome = cache
            .prewarm_for_period("t1", &cred, start, end)
            .await
            .unwrap();

        assert!(matches!(outcome, PrewarmOutcome::Skipped { estimated } if estimated > 6));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolve_covers_every_requested_id() {
        let store = Arc::new(MemoryCacheStore::new());
        store.seed("t1", "cached", "Hardware", 1);
        let api = Arc::new(CountingApi::new());
        let cache = service(Arc::clone(&store), Arc::clone(&api), 1);
        let cred = ApiCredential::new("token");

        let resolved = cache
            .resolve("t1", &cred, &ids(&["cached", "a", "b"]))
            .await
            .unwrap();

        // one budget slot: "a" fetched, "b" placeholder, "cached" from store
        assert_eq!(resolved.len(), 3);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(!resolved["cached"].pending);
        assert!(resolved.values().any(|i| i.pending));
    }
}
