// In-process transport adapter fed by an mpsc channel of raw payloads
use crate::application::distribution_hub::DistributionHub;
use crate::application::transport::{publish_raw, TransportAdapter};
use crate::domain::error::DashboardError;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub struct ChannelAdapter {
    name: String,
    rx: mpsc::Receiver<String>,
    default_batch_series: Option<String>,
}

impl ChannelAdapter {
    /// Returns the adapter and the sender producers push raw payloads into.
    pub fn new(
        name: impl Into<String>,
        buffer: usize,
        default_batch_series: Option<String>,
    ) -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        let adapter = Self {
            name: name.into(),
            rx,
            default_batch_series,
        };
        (adapter, tx)
    }
}

#[async_trait]
impl TransportAdapter for ChannelAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self, hub: &DistributionHub) -> Result<(), DashboardError> {
        let mut published = 0u64;
        let mut dropped = 0u64;

        while let Some(raw) = self.rx.recv().await {
            match publish_raw(hub, &self.name, &raw, self.default_batch_series.as_deref()) {
                Ok(()) => published += 1,
                Err(_) => dropped += 1,
            }
        }

        tracing::info!(adapter = %self.name, published, dropped, "channel closed");
        Ok(())
    }
}
