//! Product cache maintenance: purge long-unused rows and re-enrich
//! pending placeholders left behind by per-chunk budget limits.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::services::credentials::CredentialProvider;
use crate::services::product_cache::ProductCacheService;

/// Placeholders retried per maintenance pass, across all tenants.
const SWEEP_BUDGET: usize = 50;

pub async fn start_cache_maintenance_job(
    cache: Arc<ProductCacheService>,
    credentials: Arc<dyn CredentialProvider>,
) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(21600)); // Every 6 hours

        loop {
            interval.tick().await;
            tracing::info!("Starting product cache maintenance");

            if let Err(e) = cache.purge_unused().await {
                tracing::error!("Cache purge failed: {}", e);
            }

            if let Err(e) = sweep_pending(&cache, credentials.as_ref()).await {
                tracing::error!("Pending-placeholder sweep failed: {}", e);
            }
        }
    });
}

async fn sweep_pending(
    cache: &ProductCacheService,
    credentials: &dyn CredentialProvider,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pending = cache.pending_entries(SWEEP_BUDGET as u64).await?;
    if pending.is_empty() {
        return Ok(());
    }

    let mut by_tenant: HashMap<String, Vec<String>> = HashMap::new();
    for (tenant_id, product_id) in pending {
        by_tenant.entry(tenant_id).or_default().push(product_id);
    }

    for (tenant_id, product_ids) in by_tenant {
        let credential = match credentials.credential_for(&tenant_id).await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("Skipping pending sweep for {}: {}", tenant_id, e);
                continue;
            }
        };

        let enriched = cache
            .enrich(&tenant_id, &credential, &product_ids, product_ids.len())
            .await?;
        let fetched = enriched.values().filter(|i| !i.pending).count();

        tracing::info!(
            "Pending sweep for {}: {}/{} placeholders enriched",
            tenant_id,
            fetched,
            product_ids.len()
        );
    }

    Ok(())
}
