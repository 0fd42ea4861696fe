//! Runlet server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use runlet_core::config::AppConfig;
use runlet_sandbox::{Capabilities, SandboxEngine};
use runlet_server::bootstrap::report_orphaned_content;
use runlet_server::{AppState, create_router};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Runlet - a multi-tenant function runtime
#[derive(Parser, Debug)]
#[command(name = "runletd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "RUNLET_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

fn load_config(path: &str) -> Result<AppConfig> {
    // The file is optional; defaults and env vars can provide everything.
    let mut figment = Figment::new();
    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(config_path = %path, "No config file found, using defaults and environment");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("RUNLET_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Runlet v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    runlet_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = runlet_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Blob store ready");

    // from_config runs migrations.
    let metadata = runlet_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata health check failed")?;
    tracing::info!("Metadata store ready");

    let orphans = report_orphaned_content(storage.as_ref(), metadata.as_ref())
        .await
        .context("orphaned content report failed")?;
    tracing::info!(orphans = orphans.len(), "Startup consistency report complete");

    let engine = SandboxEngine::new(
        &Capabilities::from_config(&config.sandbox),
        &config.sandbox.limits,
    )
    .context("failed to initialize sandbox")?;

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::new(config, storage, metadata, engine);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
