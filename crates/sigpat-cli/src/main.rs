use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sigpat_source::FileAssetSource;
use sigpat_storage::PgInventoryStore;
use sigpat_sync::{service_with_source, SyncConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "sigpat-cli")]
#[command(about = "SIGPAT inventory browser: import, schema and API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the JSON API (default).
    Serve,
    /// Run one import cycle and exit.
    Sync {
        /// Import a saved payload instead of calling the remote listing.
        #[arg(long)]
        from_file: Option<PathBuf>,
    },
    /// Ensure the inventory table and columns exist.
    Migrate,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SIGPAT_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => sigpat_web::serve_from_env().await?,
        Commands::Sync { from_file: None } => {
            let summary = sigpat_sync::run_sync_once_from_env().await?;
            println!(
                "sync complete: run_id={} received={} imported={} skipped={}",
                summary.run_id, summary.received, summary.imported, summary.skipped
            );
        }
        Commands::Sync {
            from_file: Some(path),
        } => {
            let config = SyncConfig::from_env();
            let store = connect_store(&config).await?;
            store.ensure_schema().await.context("ensuring inventory schema")?;
            let service = service_with_source(&config, store, Arc::new(FileAssetSource::new(path)));
            let summary = service.run_once().await?;
            println!(
                "sync complete: run_id={} source={} imported={} skipped={}",
                summary.run_id, summary.source, summary.imported, summary.skipped
            );
        }
        Commands::Migrate => {
            let config = SyncConfig::from_env();
            let report = connect_store(&config)
                .await?
                .ensure_schema()
                .await
                .context("ensuring inventory schema")?;
            println!(
                "schema ready: added={} existing={} failed={}",
                report.added.len(),
                report.existing.len(),
                report.failed.len()
            );
            for (column, err) in &report.failed {
                eprintln!("  {column}: {err}");
            }
        }
    }

    Ok(())
}

async fn connect_store(config: &SyncConfig) -> Result<PgInventoryStore> {
    PgInventoryStore::connect(&config.database_url, config.db_max_connections)
        .await
        .context("connecting to inventory database")
}
