// Domain layer - Records, series and snapshots
pub mod dashboard;
pub mod error;
pub mod telemetry;
