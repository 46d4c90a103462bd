use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use erpsync_backend::handlers::sync as sync_handlers;
use erpsync_backend::jobs::{
    cache_maintenance::start_cache_maintenance_job, stale_run_sweep::start_stale_run_sweep_job,
    sync_driver::start_sync_driver_job,
};
use erpsync_backend::build_app_state;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,erpsync_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let erp_base_url =
        env::var("ERP_API_BASE_URL").expect("ERP_API_BASE_URL must be set");

    let state = build_app_state(db, erp_base_url);

    // Background jobs: drive active runs, recover stuck ones, keep the
    // product cache healthy
    start_sync_driver_job(Arc::clone(&state.executor)).await;
    start_stale_run_sweep_job(Arc::clone(&state.executor)).await;
    start_cache_maintenance_job(Arc::clone(&state.cache), Arc::clone(&state.credentials)).await;

    // Build router
    let app = Router::new()
        .route("/", get(health))
        .route("/api/sync/runs", post(sync_handlers::create_run))
        .route("/api/sync/runs/{id}/start", post(sync_handlers::start_run))
        .route("/api/sync/runs/{id}/step", post(sync_handlers::step_run))
        .route(
            "/api/sync/runs/{id}/cancel",
            post(sync_handlers::cancel_run),
        )
        .route("/api/sync/runs/{id}", get(sync_handlers::run_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("Failed to bind 0.0.0.0:3000");

    tracing::info!(
        "Server listening on {}",
        listener.local_addr().expect("listener has no local addr")
    );

    axum::serve(listener, app).await.expect("Server error");
}

async fn health() -> &'static str {
    "erpsync-backend up"
}
