// Live telemetry dashboard core - ingestion, distribution and series windowing
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
