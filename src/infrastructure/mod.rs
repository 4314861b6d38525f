// Infrastructure layer - External dependencies and adapters
pub mod channel_adapter;
pub mod config;
pub mod payload;
pub mod websocket_adapter;
