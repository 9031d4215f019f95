//! Core services acceptance: entry point.
//!
//! Initializes tracing, loads configuration from an optional TOML file and the
//! platform environment, starts the store supervisor for whichever backing
//! store is bound, sets up the Axum router and serves until signalled. A failed
//! schema check ends the process with exit code 1.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acceptance::config::{AppConfig, BackingStore, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use acceptance::http::shutdown_signal;
use acceptance::store::mysql::MySqlDriver;
use acceptance::store::{ConnectionManager, ObjectStoreMonitor};
use acceptance::templates::init_templates;
use acceptance::{create_router, AppState};

/// Core services acceptance: verify a bound data service is durable
#[derive(Parser, Debug)]
#[command(name = "acceptance", version, about)]
struct Args {
    /// Path to configuration file (defaults to config/default.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "acceptance=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

fn init_tracing(filter: &str, format: &str) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Explicit path must exist; the default path is optional
    let config_path = args
        .config
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()));
    let config = AppConfig::load(config_path.as_deref())?;

    // Priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&log_filter, &config.logging.format);

    tracing::info!(
        config = ?config_path,
        store = config.backing_store.kind(),
        instance = config.instance_index,
        "Loaded configuration"
    );
    if let Some(shadowed) = config.shadowed_service {
        tracing::warn!(
            ignored = shadowed,
            "More than one backing store is bound, using the {}",
            config.backing_store.kind()
        );
    }

    let tera = init_templates()?;
    tracing::info!("Initialized templates");

    let mut object_store = None;
    let store = match &config.backing_store {
        BackingStore::Database { uri } => {
            tracing::info!("Got access credentials to database");
            let driver = MySqlDriver::new(
                uri,
                Duration::from_secs(config.database.connect_timeout_seconds),
            )?;
            ConnectionManager::new(
                Arc::new(driver),
                Duration::from_secs(config.database.reconnect_delay_seconds),
                config.database.keepalive_interval(),
            )
        }
        BackingStore::ObjectStore { credentials } => {
            tracing::info!(
                hash = %config.instance_hash_key(),
                "Got access credentials to object store"
            );
            let monitor = ObjectStoreMonitor::new(
                credentials,
                config.instance_hash_key(),
                Duration::from_secs(config.object_store.reconnect_delay_seconds),
            );
            monitor.spawn();
            object_store = Some(monitor);
            ConnectionManager::unconfigured()
        }
        BackingStore::None => {
            tracing::error!("Not set up to use either MySQL or RiakCS as a backing store");
            ConnectionManager::unconfigured()
        }
    };
    let supervisor = store.spawn();

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    let state = AppState::new(config, tera, store, object_store);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server up and listening at http://{}", addr);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    let Some(supervisor) = supervisor else {
        server.await?;
        return Ok(ExitCode::SUCCESS);
    };

    tokio::select! {
        result = server => {
            result?;
            Ok(ExitCode::SUCCESS)
        }
        joined = supervisor => {
            match joined {
                Ok(Err(e)) => tracing::error!(error = %e, "Fatal database error, exiting"),
                Ok(Ok(never)) => match never {},
                Err(e) => tracing::error!(error = %e, "Database supervisor panicked, exiting"),
            }
            Ok(ExitCode::from(1))
        }
    }
}
