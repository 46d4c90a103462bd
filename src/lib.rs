// src/lib.rs

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use services::credentials::{CredentialProvider, EnvCredentialProvider};
use services::erp_api::ErpClient;
use services::product_cache::{ProductCacheConfig, ProductCacheService, SeaOrmCacheStore};
use services::rate_limiter::RateLimiter;
use sync::executor::{ExecutorConfig, SyncExecutor};
use sync::processors::invoices::InvoicesProcessor;
use sync::processors::orders::OrdersProcessor;
use sync::processors::receivables::ReceivablesProcessor;
use sync::processors::ChunkProcessor;
use sync::records::SeaOrmRecordStore;
use sync::store::SeaOrmRunStore;

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<SyncExecutor>,
    pub cache: Arc<ProductCacheService>,
    pub credentials: Arc<dyn CredentialProvider>,
}

/// Wire the sync stack onto a database connection. The rate limiter is the
/// process-wide singleton; everything else is built fresh and shared by
/// reference, so tests can assemble their own stack from parts.
pub fn build_app_state(db: DatabaseConnection, erp_base_url: String) -> AppState {
    let limiter = RateLimiter::global();
    let api = Arc::new(ErpClient::new(erp_base_url));
    let credentials: Arc<dyn CredentialProvider> = Arc::new(EnvCredentialProvider);

    let run_store = Arc::new(SeaOrmRunStore::new(db.clone()));
    let record_store = Arc::new(SeaOrmRecordStore::new(db.clone()));
    let cache_store = Arc::new(SeaOrmCacheStore::new(db));

    let cache = Arc::new(ProductCacheService::new(
        cache_store,
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
        Arc::new(OrdersProcessor::new(
            api,
            limiter,
            record_store,
            cache.clone(),
        )),
    ];

    let executor = Arc::new(SyncExecutor::new(
        run_store,
        credentials.clone(),
        cache.clone(),
        processors,
        ExecutorConfig::default(),
    ));

    AppState {
        executor,
        cache,
        credentials,
    }
}

pub mod entities {
    pub mod prelude;
    pub mod invoices;
    pub mod product_cache;
    pub mod receivables;
    pub mod sales_orders;
    pub mod sync_run_logs;
    pub mod sync_runs;
}

pub mod services {
    pub mod credentials;
    pub mod erp_api;
    pub mod money;
    pub mod product_cache;
    pub mod rate_limiter;
}

pub mod handlers;
pub mod jobs;
pub mod models;
pub mod sync;
