//! Terminal client: join a room over the persistent channel, or run the
//! one-shot history query.

mod session;
mod terminal;
mod view;

pub use session::{RelayAddr, RelayError, history_command, join};
