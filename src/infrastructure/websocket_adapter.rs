// WebSocket transport adapter - one per accepted ingest connection
use crate::application::distribution_hub::DistributionHub;
use crate::application::transport::{publish_raw, TransportAdapter};
use crate::domain::error::DashboardError;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

pub struct WebSocketAdapter {
    name: String,
    socket: WebSocket,
    default_batch_series: Option<String>,
}

impl WebSocketAdapter {
    pub fn new(name: String, socket: WebSocket, default_batch_series: Option<String>) -> Self {
        Self {
            name,
            socket,
            default_batch_series,
        }
    }
}

#[async_trait]
impl TransportAdapter for WebSocketAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self, hub: &DistributionHub) -> Result<(), DashboardError> {
        tracing::info!(adapter = %self.name, "ingest connection established");

        while let Some(msg) = self.socket.recv().await {
            let msg = msg.map_err(|e| DashboardError::Transport {
                adapter: self.name.clone(),
                reason: e.to_string(),
            })?;

            let default_series = self.default_batch_series.as_deref();
            match msg {
                Message::Text(text) => {
                    let _ = publish_raw(hub, &self.name, &text, default_series);
                }
                Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        let _ = publish_raw(hub, &self.name, text, default_series);
                    }
                    Err(e) => {
                        tracing::warn!(adapter = %self.name, error = %e, "dropping non-utf8 frame");
                    }
                },
                Message::Close(_) => {
                    tracing::info!(adapter = %self.name, "ingest connection closed by peer");
                    break;
                }
                // Pings are answered by axum.
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }

        Ok(())
    }
}
