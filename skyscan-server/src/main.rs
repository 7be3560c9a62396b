//! SkyScan - satellite imagery vessel detection service
//!
//! Serves the report API, the workspace API and the SSE event stream.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use skyscan_common::config::{ConfigOverrides, ServiceConfig};
use skyscan_common::db::init_database;
use skyscan_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};

use skyscan_server::services::FsBlobStore;
use skyscan_server::{build_router, AppState};

/// Per-subscriber event buffer
const EVENT_BUS_CAPACITY: usize = 256;

/// Command-line arguments
///
/// Every option can also be given through the environment. Unset options
/// fall through to the TOML config file, then to compiled defaults.
#[derive(Parser, Debug)]
#[command(name = "skyscan")]
#[command(about = "Satellite imagery vessel detection service")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/skyscan/config.toml, then /etc/skyscan/config.toml)
    #[arg(short, long, env = "SKYSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database and storage buckets
    #[arg(short, long, env = "SKYSCAN_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[arg(long, env = "SKYSCAN_HOST")]
    host: Option<String>,

    #[arg(short, long, env = "SKYSCAN_PORT")]
    port: Option<u16>,

    /// Storage bucket for uploaded images
    #[arg(long, env = "SKYSCAN_BUCKET")]
    bucket: Option<String>,

    /// Base URL used to build durable image URLs
    #[arg(long, env = "SKYSCAN_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Bound on a single durable upload, in seconds
    #[arg(long, env = "SKYSCAN_UPLOAD_TIMEOUT_SECS")]
    upload_timeout_secs: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "SKYSCAN_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config.clone(),
            root_folder: self.root_folder.clone(),
            host: self.host.clone(),
            port: self.port,
            bucket: self.bucket.clone(),
            public_base_url: self.public_base_url.clone(),
            upload_timeout_secs: self.upload_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting SkyScan v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ServiceConfig::resolve(args.overrides()).context("Failed to load configuration")?;
    config
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", config.root_folder.display());

    let db_path = config.database_path();
    let db = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let blob_store = FsBlobStore::new(
        config.bucket_path(),
        config.bucket.clone(),
        config.public_base_url.clone(),
    );
    info!(
        bucket = %config.bucket,
        upload_timeout_secs = config.upload_timeout.as_secs(),
        "Blob store: {}",
        config.bucket_path().display()
    );

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let state = AppState::new(db, event_bus, blob_store, config.upload_timeout);
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
