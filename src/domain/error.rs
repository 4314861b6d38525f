// Error taxonomy for the ingestion and routing pipeline
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("unroutable record for key {}", .key.as_deref().unwrap_or("<none>"))]
    UnroutableRecord { key: Option<String> },

    #[error("subscriber {subscription} failed: {message}")]
    HandlerFailed { subscription: u64, message: String },

    #[error("subscriber {subscription} panicked: {message}")]
    HandlerPanicked { subscription: u64, message: String },

    #[error("transport {adapter} failed: {reason}")]
    Transport { adapter: String, reason: String },

    #[error("invalid window capacity {0}, must be at least 1")]
    InvalidCapacity(usize),
}

impl DashboardError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub fn unroutable(key: Option<&str>) -> Self {
        Self::UnroutableRecord {
            key: key.map(str::to_string),
        }
    }

    /// Record-level problems the stream recovers from by dropping the record.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. } | Self::UnroutableRecord { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unroutable_display() {
        assert_eq!(
            DashboardError::unroutable(Some("cpu")).to_string(),
            "unroutable record for key cpu"
        );
        assert_eq!(
            DashboardError::unroutable(None).to_string(),
            "unroutable record for key <none>"
        );
    }

    #[test]
    fn test_record_level_classification() {
        assert!(DashboardError::malformed("bad json").is_record_level());
        assert!(!DashboardError::InvalidCapacity(0).is_record_level());
    }
}
