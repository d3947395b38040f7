//! Realtime change notification plumbing.
//!
//! The pieces shared by server and client live here: the event envelope, the
//! channel router and the WebSocket control frames. The server-only pieces
//! are the publisher hub and the WebSocket endpoint.

mod channel;
mod envelope;
mod protocol;
mod publisher;
mod ws;

pub use channel::*;
pub use envelope::*;
pub use protocol::*;
pub use publisher::*;
pub use ws::ws_handler;
