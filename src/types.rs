//! Core types for the pub/sub engine.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a logical subscription.
///
/// Monotonically increasing for the lifetime of the registry; never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Text encoding used for payload bytes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageEncoding {
    Utf8,
    Utf16Le,
}

impl Default for MessageEncoding {
    fn default() -> Self {
        MessageEncoding::Utf8
    }
}

/// Maps a logical trigger name plus optional channel options to the physical
/// topic string used for the broker subscription.
///
/// Must be pure and deterministic: the same (trigger, options) pair yields
/// the same topic for the lifetime of a subscription.
pub type TriggerTransform = Arc<dyn Fn(&str, Option<&Value>) -> String + Send + Sync>;

/// Resolves broker-level subscribe options for a new topic subscription.
pub type SubscribeOptionsResolver = Arc<dyn Fn(&str, Option<&Value>) -> Value + Send + Sync>;

/// Resolves broker-level publish options for an outgoing message.
pub type PublishOptionsResolver = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// Callback invoked with each decoded payload delivered on a subscription.
pub type Listener = Arc<dyn Fn(Value) + Send + Sync>;

/// The default trigger transform: the trigger string is the topic, verbatim.
pub fn identity_transform() -> TriggerTransform {
    Arc::new(|trigger: &str, _options: Option<&Value>| trigger.to_string())
}

/// One or more trigger names, as accepted by [`PubSub::stream`].
///
/// [`PubSub::stream`]: crate::registry::PubSub::stream
#[derive(Clone, Debug)]
pub struct Triggers(pub Vec<String>);

impl From<&str> for Triggers {
    fn from(trigger: &str) -> Self {
        Triggers(vec![trigger.to_string()])
    }
}

impl From<String> for Triggers {
    fn from(trigger: String) -> Self {
        Triggers(vec![trigger])
    }
}

impl From<Vec<String>> for Triggers {
    fn from(triggers: Vec<String>) -> Self {
        Triggers(triggers)
    }
}

impl From<Vec<&str>> for Triggers {
    fn from(triggers: Vec<&str>) -> Self {
        Triggers(triggers.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Triggers {
    fn from(triggers: &[&str]) -> Self {
        Triggers(triggers.iter().map(|t| t.to_string()).collect())
    }
}
