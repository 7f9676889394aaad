//! The registry engine: owns the subscription maps and the dispatch loop.

use crate::broker::{Connection, ConnectionListener};
use crate::codec::MessageCodec;
use crate::error::{Result, SubmuxError};
use crate::stream::SubscriptionStream;
use crate::types::{
    identity_transform, Listener, MessageEncoding, PublishOptionsResolver,
    SubscribeOptionsResolver, SubscriptionId, TriggerTransform, Triggers,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Engine configuration. Every field is independently overridable.
///
/// Defaults: identity trigger transform, no option resolvers, UTF-8 text,
/// no connection listener.
pub struct PubSubOptions {
    /// Maps (trigger, channel options) to the physical topic string.
    pub trigger_transform: TriggerTransform,

    /// Resolves broker-level subscribe options when a topic subscription is
    /// first created.
    pub subscribe_options: Option<SubscribeOptionsResolver>,

    /// Resolves broker-level publish options for each outgoing message.
    pub publish_options: Option<PublishOptionsResolver>,

    /// Text encoding for payload bytes on the wire.
    pub encoding: MessageEncoding,

    /// Receives connection lifecycle events, when the connection supports
    /// them.
    pub connection_listener: Option<ConnectionListener>,
}

impl Default for PubSubOptions {
    fn default() -> Self {
        Self {
            trigger_transform: identity_transform(),
            subscribe_options: None,
            publish_options: None,
            encoding: MessageEncoding::Utf8,
            connection_listener: None,
        }
    }
}

/// A logical registration: one listener bound to one physical topic.
struct Registration {
    topic: String,
    listener: Listener,
}

/// Per-topic state: the ids referencing the topic plus the single broker
/// handle. Exists only while at least one registration references the topic.
struct TopicState<H> {
    refs: Vec<SubscriptionId>,
    handle: H,
}

/// Both maps live under one mutex so subscribe's check-then-create and
/// unsubscribe's last-reference teardown are atomic, and so the maps can
/// never disagree about which ids exist.
struct State<C: Connection> {
    registrations: HashMap<SubscriptionId, Registration>,
    topics: HashMap<String, TopicState<C::Handle>>,
}

struct Inner<C: Connection> {
    conn: C,
    state: Mutex<State<C>>,
    next_id: AtomicU64,
    codec: MessageCodec,
    trigger_transform: TriggerTransform,
    subscribe_options: Option<SubscribeOptionsResolver>,
    publish_options: Option<PublishOptionsResolver>,
}

/// Subscription-multiplexing pub/sub engine over a broker [`Connection`].
///
/// Cloning is cheap; clones share the connection and all registry state.
pub struct PubSub<C: Connection> {
    inner: Arc<Inner<C>>,
}

impl<C: Connection> Clone for PubSub<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> PubSub<C> {
    /// Create an engine with default options.
    pub fn new(conn: C) -> Self {
        Self::with_options(conn, PubSubOptions::default())
    }

    /// Create an engine with explicit options.
    pub fn with_options(conn: C, options: PubSubOptions) -> Self {
        if let Some(listener) = options.connection_listener {
            conn.set_event_listener(listener);
        }
        Self {
            inner: Arc::new(Inner {
                conn,
                state: Mutex::new(State {
                    registrations: HashMap::new(),
                    topics: HashMap::new(),
                }),
                next_id: AtomicU64::new(0),
                codec: MessageCodec::new(options.encoding),
                trigger_transform: options.trigger_transform,
                subscribe_options: options.subscribe_options,
                publish_options: options.publish_options,
            }),
        }
    }

    /// Access the underlying broker connection.
    pub fn connection(&self) -> &C {
        &self.inner.conn
    }

    /// Number of live logical registrations.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().registrations.len()
    }

    /// Publish a payload to a topic. No subscriber needs to exist.
    ///
    /// A payload that cannot be serialized is replaced with an empty JSON
    /// object rather than aborting the publish; transport failures surface
    /// to the caller.
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> Result<()> {
        let bytes = match self.inner.codec.encode(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(topic, error = %e, "payload not serializable, publishing empty object");
                self.inner.codec.placeholder()
            }
        };
        if let Some(resolver) = &self.inner.publish_options {
            let options = resolver(topic);
            tracing::trace!(topic, options = %options, "resolved publish options");
        }
        tracing::trace!(topic, bytes = bytes.len(), "publishing");
        self.inner.conn.publish(topic, &bytes)
    }

    /// Register a listener for a trigger. Returns the new subscription id.
    ///
    /// The first subscription to a topic creates the physical broker
    /// subscription; later ones only add a reference. The existence check
    /// and the broker call happen under one lock, so concurrent subscribes
    /// to the same new topic produce exactly one physical subscription.
    pub fn subscribe(
        &self,
        trigger: &str,
        listener: Listener,
        options: Option<&Value>,
    ) -> Result<SubscriptionId> {
        let topic = (self.inner.trigger_transform)(trigger, options);
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));

        let mut state = self.inner.state.lock();
        if let Some(topic_state) = state.topics.get_mut(&topic) {
            topic_state.refs.push(id);
            tracing::trace!(%id, topic, refs = topic_state.refs.len(), "added reference to subscribed topic");
        } else {
            if let Some(resolver) = &self.inner.subscribe_options {
                let resolved = resolver(trigger, options);
                tracing::trace!(topic, options = %resolved, "resolved subscribe options");
            }
            let inner = Arc::downgrade(&self.inner);
            let dispatch_topic = topic.clone();
            let handle = self.inner.conn.subscribe(
                &topic,
                Box::new(move |raw: &[u8]| {
                    if let Some(inner) = inner.upgrade() {
                        inner.dispatch(&dispatch_topic, raw);
                    }
                }),
            )?;
            state.topics.insert(
                topic.clone(),
                TopicState {
                    refs: vec![id],
                    handle,
                },
            );
            tracing::debug!(%id, topic, "created broker subscription");
        }
        state.registrations.insert(id, Registration { topic, listener });
        Ok(id)
    }

    /// Remove a subscription. Removing the last reference to a topic
    /// releases the broker subscription.
    ///
    /// An unknown id (including a double unsubscribe) fails with
    /// [`SubmuxError::SubscriptionNotFound`] so callers can detect
    /// double-free bugs.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut state = self.inner.state.lock();
        let registration = state
            .registrations
            .remove(&id)
            .ok_or(SubmuxError::SubscriptionNotFound(id))?;

        let now_empty = match state.topics.get_mut(&registration.topic) {
            Some(topic_state) => {
                topic_state.refs.retain(|r| *r != id);
                topic_state.refs.is_empty()
            }
            None => false,
        };

        if now_empty {
            if let Some(topic_state) = state.topics.remove(&registration.topic) {
                tracing::debug!(%id, topic = registration.topic.as_str(), "releasing broker subscription");
                // The lock is held across the broker call so a concurrent
                // subscribe cannot open a second handle for this topic while
                // the old one is still live.
                self.inner.conn.unsubscribe(topic_state.handle)?;
            }
        } else {
            tracing::trace!(%id, topic = registration.topic.as_str(), "removed reference");
        }
        Ok(())
    }

    /// Consume one or more triggers as a pull-based sequence of payloads.
    ///
    /// Accepts a single trigger (`&str`/`String`) or several
    /// (`Vec<String>`, `Vec<&str>`, `&[&str]`).
    pub fn stream(&self, triggers: impl Into<Triggers>) -> Result<SubscriptionStream<C>> {
        SubscriptionStream::new(self.clone(), triggers.into())
    }
}

impl<C: Connection> Inner<C> {
    /// Deliver one raw broker message to every listener currently registered
    /// for the topic. Runs in the connection's delivery context.
    fn dispatch(&self, topic: &str, raw: &[u8]) {
        let ids = {
            let state = self.state.lock();
            match state.topics.get(topic) {
                Some(topic_state) => topic_state.refs.clone(),
                None => return,
            }
        };
        if ids.is_empty() {
            return;
        }

        let payload = self.codec.decode(raw);
        tracing::trace!(topic, listeners = ids.len(), "dispatching message");

        for id in ids {
            // A listener may unsubscribe itself or others mid-dispatch;
            // re-check membership before each delivery. The lock is released
            // before invoking so listeners can call back into the registry.
            let listener = {
                let state = self.state.lock();
                state.registrations.get(&id).map(|r| r.listener.clone())
            };
            let Some(listener) = listener else { continue };
            let payload = payload.clone();
            if catch_unwind(AssertUnwindSafe(move || listener(payload))).is_err() {
                tracing::error!(%id, topic, "listener panicked during dispatch");
            }
        }
    }
}
