//! Persistent channel
//!
//! One WebSocket per client session. Incoming events are handled to
//! completion in arrival order; outgoing events are queued on a bounded
//! per-session channel and written by a dedicated sender task.

mod handler;
mod protocol;

pub use handler::handle_session;
pub use protocol::{ClientEvent, ServerEvent};
