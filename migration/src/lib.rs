pub use sea_orm_migration::prelude::*;

mod m20260715_000001_create_sync_runs;
mod m20260715_000002_create_sync_run_logs;
mod m20260715_000003_create_product_cache;
mod m20260716_000001_create_invoices;
mod m20260716_000002_create_receivables;
mod m20260716_000003_create_sales_orders;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260715_000001_create_sync_runs::Migration),
            Box::new(m20260715_000002_create_sync_run_logs::Migration),
            Box::new(m20260715_000003_create_product_cache::Migration),
            Box::new(m20260716_000001_create_invoices::Migration),
            Box::new(m20260716_000002_create_receivables::Migration),
            Box::new(m20260716_000003_create_sales_orders::Migration),
        ]
    }
}
