// Application layer - Distribution, routing and the transport contract
pub mod distribution_hub;
pub mod error_sink;
pub mod series_router;
pub mod transport;
