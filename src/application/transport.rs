// Transport boundary - Adapter contract and the hub-to-router wiring
use crate::application::distribution_hub::{DistributionHub, SubscriptionId};
use crate::application::series_router::SeriesRouter;
use crate::domain::error::DashboardError;
use crate::domain::telemetry::Record;
use crate::infrastructure::payload::decode_record;
use async_trait::async_trait;

/// A push source of records for the hub.
///
/// Connection lifecycle, reconnects and topic management belong to the
/// implementation. `run` returns when the transport ends, or with
/// `DashboardError::Transport` when it fails.
#[async_trait]
pub trait TransportAdapter: Send {
    fn name(&self) -> &str;

    async fn run(&mut self, hub: &DistributionHub) -> Result<(), DashboardError>;
}

/// Decodes one raw payload and publishes it. Malformed payloads are logged
/// and dropped so the stream continues.
pub fn publish_raw(
    hub: &DistributionHub,
    adapter: &str,
    raw: &str,
    default_batch_series: Option<&str>,
) -> Result<(), DashboardError> {
    match decode_record(raw, default_batch_series) {
        Ok(record) => {
            hub.publish(record);
            Ok(())
        }
        Err(err) => {
            tracing::warn!(adapter, error = %err, "dropping inbound payload");
            Err(err)
        }
    }
}

/// Subscribes the router to the hub. Unroutable records are warnings, not
/// handler failures.
pub fn connect_router(hub: &DistributionHub, router: SeriesRouter) -> SubscriptionId {
    hub.subscribe(move |record| {
        let outcome = match record {
            Record::Point(point) => router.route(point).map(|_| ()),
            Record::Batch { series_key, batch } => router.route_batch(series_key, batch),
        };

        match outcome {
            Err(err) if err.is_record_level() => {
                tracing::warn!(error = %err, "record dropped");
                Ok(())
            }
            other => other.map_err(anyhow::Error::from),
        }
    })
}
