pub mod health;
pub mod messages;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler, health_ready_handler, metrics_handler};
pub use messages::list_messages;
pub use websocket::websocket_handler;
