// Presentation layer - HTTP surface over the hub and router
pub mod app_state;
pub mod handlers;
