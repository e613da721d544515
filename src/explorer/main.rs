//! Explorer server.
//!
//! Hosts one viewport session over the SkyTrade data API and exposes its
//! viewport events, hex grid, cell selection and point view over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use skytrade_explorer::fetch::HttpPointSource;
use skytrade_explorer::viewport::CycleTrigger;
use skytrade_explorer::{Config, ExplorerSession};

mod routes;
use routes::AppState;

#[derive(Parser, Debug)]
#[command(name = "explorer")]
#[command(about = "SkyTrade hex-grid explorer server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data API base URL (overrides config and SKYTRADE_API_URL)
    #[arg(long)]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("SkyTrade Explorer");

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.api_url {
        config.api.base_url = Some(url);
    }

    // Start anyway so the error reaches the user through the banner
    let base_url = match config.api_base_url() {
        Ok(url) => {
            info!("Using data API at {}", url);
            Some(url)
        }
        Err(e) => {
            warn!("{}; every fetch will fail until it is set", e);
            None
        }
    };

    let source = HttpPointSource::new(base_url, config.request_timeout())
        .context("Failed to create HTTP client")?;
    let session = ExplorerSession::new(source, &config);
    session.start();

    let initial = session.clone();
    tokio::spawn(async move {
        initial.run_cycle(CycleTrigger::Initial).await;
    });

    let state = Arc::new(AppState { session });

    let app = routes::router(Arc::clone(&state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.session.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
