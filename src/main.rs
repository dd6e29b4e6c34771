//! CityPulse Orchestrator — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the source registry, transport,
//! routes, and the Prometheus exporter.
//!
//! See `README.md` for quickstart.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use citypulse::api::{create_router, AppState};
use citypulse::dispatch::HttpTransport;
use citypulse::metrics::Metrics;
use citypulse::registry::Registry;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("citypulse=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    // This enables CITYPULSE_REGISTRY_PATH / CITYPULSE_PORT from .env.
    let _ = dotenvy::dotenv();

    init_tracing();

    // The registry is the only required config; refuse to start without it.
    let registry = Arc::new(Registry::load_default().context("load source registry")?);
    info!(sources = registry.len(), "registry loaded");

    let metrics = Metrics::init(registry.len());

    let call_timeout = std::time::Duration::from_secs(registry.call_timeout_secs());
    let transport = Arc::new(HttpTransport::new(call_timeout).context("build http transport")?);
    let state = AppState::new(registry, transport);

    let router = create_router(state).merge(metrics.router());

    let port: u16 = std::env::var("CITYPULSE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router).await.context("serve")?;
    Ok(())
}
