//! The broker connection boundary.
//!
//! The registry consumes a [`Connection`]: publish/subscribe/unsubscribe
//! primitives over an external message broker. Everything below that line
//! (transport, reconnection, delivery threading) belongs to the
//! implementation, not the registry. The broker is assumed to deliver
//! at-most-once, in order per topic.
//!
//! [`MemoryConnection`] is an in-process implementation for embedding the
//! engine without an external broker, and the transport used by the test
//! suites.

mod memory;

pub use memory::{MemoryConnection, MemoryHandle};

use crate::error::Result;
use std::sync::Arc;

/// Handler invoked by the connection with each raw message on a topic.
pub type MessageHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Connection lifecycle events, forwarded to a caller-supplied listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connect,
    Error(String),
    Disconnect,
    Reconnecting,
    Reconnect,
    Close,
}

/// Callback receiving connection lifecycle events.
pub type ConnectionListener = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// A live connection to a message broker.
///
/// `Handle` is the broker's identifier for one physical topic subscription.
/// Only the registry calls `subscribe`/`unsubscribe`; it guarantees at most
/// one live handle per topic.
///
/// Implementations may deliver messages from any thread; handlers passed to
/// [`subscribe`](Connection::subscribe) must be invoked one message at a
/// time, in the broker's per-topic delivery order.
pub trait Connection: Send + Sync + 'static {
    /// Broker-side identifier for a physical topic subscription.
    type Handle: Send;

    /// Send raw payload bytes to a topic.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    /// Open a physical subscription; `on_message` receives every raw message
    /// delivered on the topic until the handle is unsubscribed.
    fn subscribe(&self, topic: &str, on_message: MessageHandler) -> Result<Self::Handle>;

    /// Release a physical subscription.
    fn unsubscribe(&self, handle: Self::Handle) -> Result<()>;

    /// Attach a lifecycle-event listener.
    ///
    /// The default implementation drops the listener: connections without
    /// lifecycle events simply never report any.
    fn set_event_listener(&self, listener: ConnectionListener) {
        let _ = listener;
    }
}
