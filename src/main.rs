//! gridcache CLI - inspect and manage the offline content store.
//!
//! A thin wrapper over the library for troubleshooting from a shell:
//! `gridcache --status` (default), `--sync`, `--clear`, `--reset`.

use std::io;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gridcache::{
    ContentDatabase, DirectoryEstimator, HttpContentSource, JsonFilePreferences,
    OfflineContentManager,
};

/// Backend base URL when GRIDCACHE_API_URL is unset.
const DEFAULT_API_URL: &str = "https://api.gridview.example";

/// Quota reported by the directory estimator: 512 MB leaves generous
/// headroom over the default 50 MB preference ceiling.
const ESTIMATOR_QUOTA_BYTES: u64 = 512 * 1024 * 1024;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("gridcache starting");

    let base_url =
        std::env::var("GRIDCACHE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

    let db = ContentDatabase::at_default_location()?;
    let estimator = DirectoryEstimator::new(db.root(), ESTIMATOR_QUOTA_BYTES);
    let manager = OfflineContentManager::builder(
        db,
        Box::new(JsonFilePreferences::at_default_location()?),
        Arc::new(HttpContentSource::new(base_url)?),
    )
    .estimator(Box::new(estimator))
    .build();

    manager.initialize().await;

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--sync") => {
            manager.sync().await;
            print_status(&manager).await;
        }
        Some("--clear") => {
            if manager.clear_all().await {
                println!("cleared all cached content");
            } else {
                eprintln!("failed to clear cached content (see logs)");
            }
        }
        Some("--reset") => {
            manager.reset_database().await;
            println!("database reset");
        }
        Some("--status") | None => print_status(&manager).await,
        Some(other) => {
            eprintln!("unknown option: {other}");
            eprintln!("usage: gridcache [--status | --sync | --clear | --reset]");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn print_status(manager: &OfflineContentManager) {
    println!("state: {:?}", manager.state());

    let usage = manager.storage_usage().await;
    println!(
        "storage: {} / {} bytes",
        usage.used_bytes, usage.total_bytes
    );

    for descriptor in manager.list(gridcache::ListFilter::All) {
        let status = if descriptor.is_available {
            let updated = descriptor
                .last_updated
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            format!("{} bytes, updated {updated}", descriptor.size_bytes)
        } else {
            "not cached".to_string()
        };
        println!("  {:12} {} - {}", descriptor.content_type, descriptor.title, status);
    }
}
