// Main entry point - Dependency injection and server setup
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tokio::io::{AsyncBufReadExt, BufReader};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use live_dashboard::application::distribution_hub::DistributionHub;
use live_dashboard::application::series_router::SeriesRouter;
use live_dashboard::application::transport::{connect_router, TransportAdapter};
use live_dashboard::infrastructure::channel_adapter::ChannelAdapter;
use live_dashboard::infrastructure::config::load_dashboard_config;
use live_dashboard::presentation::app_state::AppState;
use live_dashboard::presentation::handlers::{
    get_series, health_check, ingest, list_series, post_record, set_capacity, stream_snapshots,
};

const STDIN_CHANNEL_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_dashboard_config()?;
    let addr = config.listen_addr()?;

    // One hub and one router for the whole process
    let hub = DistributionHub::new();
    let router = SeriesRouter::new(config.roster(), config.window.policy, config.window.capacity)?;
    connect_router(&hub, router.clone());

    tracing::info!(
        series = config.series.len(),
        capacity = router.capacity(),
        policy = ?router.policy(),
        "series router ready"
    );

    if config.ingest.stdin {
        spawn_stdin_feed(hub.clone(), config.ingest.default_batch_series.clone());
    }

    let state = Arc::new(AppState {
        hub,
        router,
        default_batch_series: config.ingest.default_batch_series.clone(),
        ingest_connections: Arc::new(AtomicU64::new(0)),
    });

    let snapshot_routes = Router::new()
        .route("/series", get(list_series))
        .route("/series/:key", get(get_series))
        .layer(CompressionLayer::new());

    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/snapshots/stream", get(stream_snapshots))
        .route("/capacity", put(set_capacity))
        .route("/records", post(post_record))
        .route("/ingest", get(ingest))
        .merge(snapshot_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!(%addr, "starting live-dashboard");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}

/// Feeds newline-delimited payloads from stdin through a channel adapter.
fn spawn_stdin_feed(hub: DistributionHub, default_batch_series: Option<String>) {
    let (mut adapter, tx) = ChannelAdapter::new("stdin", STDIN_CHANNEL_BUFFER, default_batch_series);

    tokio::spawn(async move {
        if let Err(e) = adapter.run(&hub).await {
            tracing::error!(adapter = adapter.name(), error = %e, "transport failed");
        }
    });

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
}
