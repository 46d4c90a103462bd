// src/bin/run_full_sync.rs
//
// Manually create and drive a sync run to completion from the command
// line. Useful for backfills and for testing a tenant's credential:
//
//   cargo run --bin run_full_sync -- <tenant_id> [start YYYY-MM-DD] [end YYYY-MM-DD]

use chrono::NaiveDate;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;

use erpsync_backend::build_app_state;
use erpsync_backend::sync::run::SyncMode;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <tenant_id> [start YYYY-MM-DD] [end YYYY-MM-DD]", args[0]);
        std::process::exit(1);
    }

    let tenant_id = args[1].clone();
    let period_start = args.get(2).map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d")).transpose()?;
    let period_end = args.get(3).map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d")).transpose()?;
    let mode = if period_start.is_some() {
        SyncMode::Period
    } else {
        SyncMode::Incremental
    };

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let erp_base_url = env::var("ERP_API_BASE_URL").expect("ERP_API_BASE_URL must be set");

    let db = Database::connect(&database_url).await?;
    migration::Migrator::up(&db, None).await?;

    let state = build_app_state(db, erp_base_url);

    let run = state
        .executor
        .create_run(tenant_id, mode, period_start, period_end, None)
        .await?;
    println!("Created run {}", run.id);

    state.executor.start_run(run.id).await?;

    loop {
        let report = state.executor.step(run.id).await?;

        if report.busy {
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            continue;
        }

        println!(
            "[{:>3}%] {} module={:?} processed={}",
            report.overall_progress_percent,
            report.status.as_str(),
            report.current_module,
            report.processed
        );

        if report.done {
            if let Some(error) = report.error {
                eprintln!("Run finished with error: {}", error);
                std::process::exit(1);
            }
            println!("Run {} complete", run.id);
            break;
        }
    }

    Ok(())
}
