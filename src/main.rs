//! HarvestGrid API server
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (data in the platform data dir, port 8095)
//! harvestgrid
//!
//! # Custom config file
//! harvestgrid --config /etc/harvestgrid/config.toml
//!
//! # Override data directory and port
//! harvestgrid --data-dir /var/lib/harvestgrid --http-port 9000
//! ```
//!
//! Settings resolve in order: defaults, config file, environment
//! (`HARVESTGRID_*`, also read from `.env`), command-line flags.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use harvestgrid::services::events::spawn_logging_listener;
use harvestgrid::{Config, HttpServer, MarketDb, Services};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "harvestgrid")]
#[command(about = "Marketplace API connecting farms and restaurants")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "HARVESTGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the SQLite database
    #[arg(long, env = "HARVESTGRID_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Interface to bind the HTTP API on
    #[arg(long, env = "HARVESTGRID_HOST")]
    host: Option<IpAddr>,

    /// HTTP API port
    #[arg(long, env = "HARVESTGRID_HTTP_PORT")]
    http_port: Option<u16>,

    /// Maximum pooled SQLite connections
    #[arg(long, env = "HARVESTGRID_DB_POOL_SIZE")]
    db_pool_size: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "HARVESTGRID_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(host) = args.host {
        config.bind_host = host;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(size) = args.db_pool_size {
        config.db_pool_size = size;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("harvestgrid={},info", config.log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        data_dir = %config.data_dir.display(),
        http_port = config.http_port,
        "Starting harvestgrid"
    );

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

    let config_path = config.data_dir.join("config.toml");
    if args.config.is_none() && !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(MarketDb::open(&config.database_path(), config.db_pool_size)?);
    let stats = db.stats()?;
    info!(
        organizations = stats.organizations,
        commitments = stats.commitments,
        "Database ready"
    );

    let services = Arc::new(Services::new(db));
    spawn_logging_listener(services.events.clone());

    let server = Arc::new(HttpServer::new(services, config.bind_addr()));

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
