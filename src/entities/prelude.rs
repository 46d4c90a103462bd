pub use super::invoices::Entity as Invoices;
pub use super::product_cache::Entity as ProductCache;
pub use super::receivables::Entity as Receivables;
pub use super::sales_orders::Entity as SalesOrders;
pub use super::sync_run_logs::Entity as SyncRunLogs;
pub use super::sync_runs::Entity as SyncRuns;
