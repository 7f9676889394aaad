//! Pull-based consumption of registry subscriptions.
//!
//! The registry delivers by pushing into listener callbacks. A
//! [`SubscriptionStream`] bridges that to a pull protocol: each trigger gets
//! an internal listener that enqueues decoded payloads into one shared FIFO,
//! and the consumer drains the FIFO one payload at a time, blocking while it
//! is empty. Closing the stream releases every underlying registration.

use crate::broker::Connection;
use crate::error::Result;
use crate::registry::PubSub;
use crate::types::{SubscriptionId, Triggers};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A cancellable pull-based sequence of decoded payloads over one or more
/// triggers.
///
/// The sequence has no natural end: it yields payloads until [`close`] is
/// called (or the stream is dropped), after which every pull returns `None`.
/// A closed stream cannot be restarted; construct a fresh one to resume
/// listening. Intended for a single consumer: only one outstanding
/// [`next`] call is supported at a time.
///
/// [`next`]: SubscriptionStream::next
/// [`close`]: SubscriptionStream::close
pub struct SubscriptionStream<C: Connection> {
    pubsub: PubSub<C>,
    receiver: Receiver<Value>,
    ids: Mutex<Vec<SubscriptionId>>,
    closed: AtomicBool,
}

impl<C: Connection> SubscriptionStream<C> {
    /// Subscribe to every trigger, wiring each listener to the shared queue.
    pub(crate) fn new(pubsub: PubSub<C>, triggers: Triggers) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let mut ids = Vec::with_capacity(triggers.0.len());
        for trigger in &triggers.0 {
            let sender = sender.clone();
            let result = pubsub.subscribe(
                trigger,
                Arc::new(move |payload| {
                    // The consumer may already be gone; that only means the
                    // payload is discarded.
                    let _ = sender.send(payload);
                }),
                None,
            );
            match result {
                Ok(id) => ids.push(id),
                Err(e) => {
                    // Roll back the triggers already subscribed.
                    for id in ids {
                        let _ = pubsub.unsubscribe(id);
                    }
                    return Err(e);
                }
            }
        }
        // The listeners now hold the only senders, so the channel disconnects
        // exactly when the last registration is removed.
        drop(sender);

        tracing::trace!(triggers = ?triggers.0, "subscription stream opened");
        Ok(Self {
            pubsub,
            receiver,
            ids: Mutex::new(ids),
            closed: AtomicBool::new(false),
        })
    }

    /// Ids of the underlying registrations, in trigger order. Empty once the
    /// stream is closed.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.ids.lock().clone()
    }

    /// Whether [`close`](SubscriptionStream::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pull the next payload, blocking while the buffer is empty.
    ///
    /// Returns `None` once the stream is closed, including when
    /// [`close`](SubscriptionStream::close) runs on another thread while
    /// this call is blocked.
    pub fn next(&self) -> Option<Value> {
        if self.is_closed() {
            return None;
        }
        match self.receiver.recv() {
            // close() may have raced with an in-flight delivery; the closed
            // flag wins.
            Ok(payload) if !self.is_closed() => Some(payload),
            _ => None,
        }
    }

    /// Pull the next payload without blocking. Returns `None` when the
    /// buffer is empty or the stream is closed.
    pub fn try_next(&self) -> Option<Value> {
        if self.is_closed() {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(payload) if !self.is_closed() => Some(payload),
            Ok(_) | Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Pull the next payload, blocking at most `timeout`.
    pub fn next_timeout(&self, timeout: Duration) -> Option<Value> {
        if self.is_closed() {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(payload) if !self.is_closed() => Some(payload),
            Ok(_) | Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Cancel the stream: unsubscribe every trigger (the normal refcount
    /// decrement) and resolve any blocked [`next`](SubscriptionStream::next)
    /// with end-of-sequence.
    ///
    /// Idempotent; a second call has no further effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the registrations drops the queue senders, which
        // disconnects the channel and wakes a blocked consumer.
        for id in self.ids.lock().drain(..) {
            if let Err(e) = self.pubsub.unsubscribe(id) {
                tracing::error!(%id, error = %e, "failed to release stream subscription");
            }
        }
        tracing::trace!("subscription stream closed");
    }
}

impl<C: Connection> Iterator for SubscriptionStream<C> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        SubscriptionStream::next(self)
    }
}

impl<C: Connection> Drop for SubscriptionStream<C> {
    fn drop(&mut self) {
        self.close();
    }
}
