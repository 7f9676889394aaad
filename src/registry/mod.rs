//! Subscription registry: reference-counted multiplexing of logical
//! listeners onto physical broker topic subscriptions.
//!
//! Any number of listeners may subscribe to the same trigger; the registry
//! keeps exactly one broker subscription per topic alive while at least one
//! listener references it, fans incoming messages out to every current
//! listener, and tears the topic down when the last reference is removed.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use submux::{MemoryConnection, PubSub};
//!
//! let pubsub = PubSub::new(MemoryConnection::new());
//!
//! let id = pubsub.subscribe(
//!     "orders.created",
//!     Arc::new(|payload| println!("order: {payload}")),
//!     None,
//! )?;
//!
//! pubsub.publish("orders.created", &serde_json::json!({"id": 42}))?;
//! pubsub.unsubscribe(id)?;
//! # Ok::<(), submux::SubmuxError>(())
//! ```

mod manager;

pub use manager::{PubSub, PubSubOptions};
