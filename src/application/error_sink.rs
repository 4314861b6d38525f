// Error sink for failures the pipeline isolates and swallows
use crate::domain::error::DashboardError;

pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &DashboardError);
}

/// Default sink: record-level problems are warnings, everything else an error.
#[derive(Debug, Clone, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: &DashboardError) {
        if error.is_record_level() {
            tracing::warn!(%error, "record dropped");
        } else {
            tracing::error!(%error, "pipeline failure isolated");
        }
    }
}
