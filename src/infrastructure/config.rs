use crate::application::series_router::{RoutingPolicy, DEFAULT_CAPACITY};
use crate::domain::dashboard::{palette_color, ChartKind, SeriesConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default = "default_series")]
    pub series: Vec<SeriesEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowSettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub policy: RoutingPolicy,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            policy: RoutingPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestSettings {
    /// Target for batches that arrive without a series key.
    pub default_batch_series: Option<String>,
    /// Read newline-delimited payloads from stdin.
    #[serde(default)]
    pub stdin: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesEntry {
    pub key: String,
    pub kind: ChartKind,
    pub title: String,
    pub color: Option<String>,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_series() -> Vec<SeriesEntry> {
    vec![
        SeriesEntry {
            key: "line".to_string(),
            kind: ChartKind::Line,
            title: "Line Chart".to_string(),
            color: None,
        },
        SeriesEntry {
            key: "bar".to_string(),
            kind: ChartKind::Bar,
            title: "Bar Chart".to_string(),
            color: None,
        },
    ]
}

impl DashboardConfig {
    /// Series roster in declaration order; missing colors come from the palette.
    pub fn roster(&self) -> Vec<SeriesConfig> {
        self.series
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let color = entry
                    .color
                    .clone()
                    .unwrap_or_else(|| palette_color(idx).to_string());
                SeriesConfig::new(entry.key.clone(), entry.kind, entry.title.clone(), color)
            })
            .collect()
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.server.listen.parse()?)
    }

    fn validate(self) -> anyhow::Result<Self> {
        if self.window.capacity == 0 {
            anyhow::bail!("window.capacity must be at least 1");
        }

        let mut seen = HashSet::new();
        for entry in &self.series {
            if !seen.insert(entry.key.as_str()) {
                anyhow::bail!("duplicate series key {}", entry.key);
            }
        }

        if let Some(target) = &self.ingest.default_batch_series {
            if !self.series.iter().any(|s| &s.key == target || &s.title == target) {
                anyhow::bail!("ingest.default_batch_series {} is not a configured series", target);
            }
        }

        self.listen_addr()?;
        Ok(self)
    }
}

/// Loads `config/dashboard.*` if present, then `DASHBOARD__*` environment overrides.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let dashboard: DashboardConfig = settings.try_deserialize()?;
    dashboard.validate()
}

#[cfg(test)]
pub fn parse_dashboard_config(toml: &str) -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    let dashboard: DashboardConfig = settings.try_deserialize()?;
    dashboard.validate()
}
