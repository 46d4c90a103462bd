pub mod cache_maintenance;
pub mod stale_run_sweep;
pub mod sync_driver;
