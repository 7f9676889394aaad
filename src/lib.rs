//! # submux
//!
//! A subscription-multiplexing pub/sub adapter: many independent logical
//! listeners share a small number of physical broker subscriptions, and each
//! listener can be consumed either as a direct callback or as a pull-based,
//! cancellable sequence of decoded payloads.
//!
//! ## Core Concepts
//!
//! - **Registry**: reference-counted mapping of logical subscriptions onto
//!   physical topics, with one broker subscription per topic however many
//!   listeners reference it
//! - **Trigger transform**: logical trigger names are mapped to physical
//!   topic strings by a configurable pure function
//! - **Codec**: payloads cross the broker boundary as JSON text; malformed
//!   messages degrade to raw strings instead of being dropped
//! - **Streams**: push-delivered messages bridged to a pull protocol with
//!   blocking `next` and idempotent cancellation
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use submux::{MemoryConnection, PubSub};
//!
//! let pubsub = PubSub::new(MemoryConnection::new());
//!
//! // Callback-style consumption.
//! let id = pubsub.subscribe(
//!     "greetings",
//!     Arc::new(|payload| println!("got {payload}")),
//!     None,
//! )?;
//!
//! // Pull-style consumption of the same topic.
//! let stream = pubsub.stream("greetings")?;
//!
//! pubsub.publish("greetings", &serde_json::json!({"hello": "world"}))?;
//! assert_eq!(stream.next(), Some(serde_json::json!({"hello": "world"})));
//!
//! stream.close();
//! pubsub.unsubscribe(id)?;
//! # Ok::<(), submux::SubmuxError>(())
//! ```

pub mod broker;
pub mod codec;
pub mod error;
pub mod registry;
pub mod stream;
pub mod types;

// Re-exports
pub use broker::{
    Connection, ConnectionEvent, ConnectionListener, MemoryConnection, MemoryHandle,
    MessageHandler,
};
pub use codec::MessageCodec;
pub use error::{Result, SubmuxError};
pub use registry::{PubSub, PubSubOptions};
pub use stream::SubscriptionStream;
pub use types::{
    identity_transform, Listener, MessageEncoding, PublishOptionsResolver,
    SubscribeOptionsResolver, SubscriptionId, TriggerTransform, Triggers,
};
