// Application state for HTTP handlers
use crate::application::distribution_hub::DistributionHub;
use crate::application::series_router::SeriesRouter;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub hub: DistributionHub,
    pub router: SeriesRouter,
    pub default_batch_series: Option<String>,
    /// Sequence for naming ingest WebSocket adapters.
    pub ingest_connections: Arc<AtomicU64>,
}
