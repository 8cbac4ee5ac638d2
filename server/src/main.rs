//! booksync server
//!
//! Looks books up on Douban by ISBN and writes them into a Feishu bitable
//! table through a user-maintained field mapping.
//!
//! Usage:
//!   booksync-server --config config/booksync.json --port 8080
//!
//! A missing config file is created with empty credentials.

use anyhow::{Context, Result};
use booksync_server::config::AppConfig;
use booksync_server::{AppState, build_router};
use booksync_sync::{BookSync, MappingStore};
use booksync_types::Scope;
use clap::Parser;
use std::{fs, path::Path, path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "booksync-server")]
#[command(about = "Sync book metadata from Douban into a Feishu bitable table")]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config/booksync.json")]
    config: PathBuf,

    /// Override the configured listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("booksync server starting...");
    let mut config = AppConfig::load_or_create(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let missing = config.feishu.missing_settings();
    if !missing.is_empty() {
        warn!(
            "Feishu settings missing ({}); edit {:?} before syncing",
            missing.join(", "),
            args.config
        );
    }

    if let Some(dir) = Path::new(&config.server.mapping_db)
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
    {
        fs::create_dir_all(dir).context("Failed to create mapping store directory")?;
    }
    let store = MappingStore::new(&config.server.mapping_db)
        .context("Failed to open mapping store")?;

    let scope = Scope::new(config.feishu.table_id.clone());
    let service = BookSync::from_config(
        config.feishu.clone(),
        config.douban.clone(),
        store,
        config.engine.clone(),
    )
    .context("Failed to initialise sync service")?;

    let app = build_router(Arc::new(AppState { service, scope }));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
