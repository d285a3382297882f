//! Realtime fan-out
//!
//! Multiplexes change events from one transport connection per watched key
//! out to any number of listener callbacks. The dispatcher holds exactly
//! one live connection per distinct key while at least one listener is
//! registered, and zero once the last listener leaves.

pub mod dispatcher;
pub mod event;
pub mod transport;
pub mod ws;

pub use dispatcher::{FanoutDispatcher, Listener, Subscription};
pub use event::{ChangeEvent, WatchKey};
pub use transport::{EventSink, MemoryTransport, RealtimeTransport, TransportConnection};
pub use ws::WsTransport;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("subscription transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    Closed,
}
