mod http;
mod metrics;
mod websocket;

use anyhow::{Context, Result};
use discuss_embed_core::{lookup_from_settings, RepositoryLookup, Settings};
use metrics::MetricsCollector;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Shared by the HTTP and WebSocket listeners.
pub struct AppState {
    pub lookup: Arc<dyn RepositoryLookup>,
    pub metrics: Arc<MetricsCollector>,
    pub settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discuss_embed_api=info,discuss_embed_core=info,tower_http=info".into()),
        )
        .init();

    let http_port = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(42069);

    let http_addr = SocketAddr::from(([0, 0, 0, 0], http_port));

    let ws_port = std::env::var("WS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(42070);

    let ws_addr = SocketAddr::from(([0, 0, 0, 0], ws_port));

    let settings = Settings::from_env();
    let lookup = lookup_from_settings(&settings).context("Failed to build lookup client")?;

    info!(
        lookup_url = %lookup.endpoint(),
        debounce_ms = settings.debounce.as_millis() as u64,
        "Using lookup service"
    );

    let state = Arc::new(AppState {
        lookup: Arc::new(lookup),
        metrics: Arc::new(MetricsCollector::new()),
        settings,
    });

    info!("Starting discuss-embed-api HTTP on http://{}", http_addr);
    info!("Starting discuss-embed-api WebSocket on ws://{}", ws_addr);

    tokio::try_join!(
        http::serve(http_addr, state.clone()),
        websocket::serve(ws_addr, state)
    )?;

    Ok(())
}
