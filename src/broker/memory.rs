//! In-process loopback broker.

use super::{Connection, ConnectionEvent, ConnectionListener, MessageHandler};
use crate::error::{Result, SubmuxError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle identifying one physical subscription on a [`MemoryConnection`].
#[derive(Debug)]
pub struct MemoryHandle {
    topic: String,
    sid: u64,
}

/// An in-process broker: messages are delivered synchronously, in publish
/// order, to every handler subscribed at publish time.
///
/// Handlers are invoked with no broker lock held, so they may freely call
/// back into `publish`/`subscribe`/`unsubscribe`. Subscribe/unsubscribe call
/// counters expose the physical subscription traffic a registry generates,
/// which is what the multiplexing tests assert on.
#[derive(Default)]
pub struct MemoryConnection {
    topics: Mutex<HashMap<String, HashMap<u64, Arc<MessageHandler>>>>,
    next_sid: AtomicU64,
    listener: Mutex<Option<ConnectionListener>>,
    subscribe_calls: AtomicU64,
    unsubscribe_calls: AtomicU64,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total `subscribe` calls made against this connection.
    pub fn subscribe_calls(&self) -> u64 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Total `unsubscribe` calls made against this connection.
    pub fn unsubscribe_calls(&self) -> u64 {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of live physical subscriptions for a topic.
    pub fn active_subscriptions(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    /// Drop all subscriptions and emit [`ConnectionEvent::Close`].
    pub fn close(&self) {
        self.topics.lock().clear();
        self.emit(&ConnectionEvent::Close);
    }

    fn emit(&self, event: &ConnectionEvent) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }
}

impl Connection for MemoryConnection {
    type Handle = MemoryHandle;

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        // Snapshot the handlers, then invoke them outside the lock.
        let handlers: Vec<Arc<MessageHandler>> = {
            let topics = self.topics.lock();
            match topics.get(topic) {
                Some(handlers) => handlers.values().cloned().collect(),
                None => Vec::new(),
            }
        };
        for handler in handlers {
            handler(payload);
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str, on_message: MessageHandler) -> Result<MemoryHandle> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let sid = self.next_sid.fetch_add(1, Ordering::SeqCst);
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .insert(sid, Arc::new(on_message));
        Ok(MemoryHandle {
            topic: topic.to_string(),
            sid,
        })
    }

    fn unsubscribe(&self, handle: MemoryHandle) -> Result<()> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        let mut topics = self.topics.lock();
        let mut removed = false;
        let mut topic_empty = false;
        if let Some(handlers) = topics.get_mut(&handle.topic) {
            removed = handlers.remove(&handle.sid).is_some();
            topic_empty = handlers.is_empty();
        }
        if topic_empty {
            topics.remove(&handle.topic);
        }
        if removed {
            Ok(())
        } else {
            Err(SubmuxError::Transport(format!(
                "unknown subscription {} on topic '{}'",
                handle.sid, handle.topic
            )))
        }
    }

    fn set_event_listener(&self, listener: ConnectionListener) {
        *self.listener.lock() = Some(listener);
        // The in-process broker is connected from construction.
        self.emit(&ConnectionEvent::Connect);
    }
}
