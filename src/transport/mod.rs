//! Publish/subscribe transport boundary.
//!
//! The compliance client is transport-agnostic: everything it needs from
//! the bus is captured by the [`Transport`] trait. Implementations must
//! deliver messages at least once with per-topic ordering, and must invoke
//! subscription handlers on a thread of their own, since callers of the client
//! block while a handler completes their pending call.
//!
//! The only in-repo implementation is the mock broker used by tests and
//! the self-check mode of the CLI; a real broker adapter lives outside
//! this crate.

use std::sync::Arc;

/// One inbound message as delivered by the transport.
#[derive(Debug, Clone)]
pub struct Message {
    /// Topic the message was published to.
    pub topic: String,

    /// Raw payload bytes.
    pub payload: Vec<u8>,

    /// Reply topic attached by the publisher, when any.
    pub reply_topic: Option<String>,
}

/// Subscription callback. Invoked on a transport-owned thread; shared
/// between the transport and the subscriber, hence `Arc`.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Topic-based publish/subscribe transport.
pub trait Transport: Send + Sync {
    /// Publish a payload, optionally attaching a reply topic for the
    /// receiver to answer on.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        reply_topic: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Register a handler for a topic (or topic filter, where the
    /// transport supports filters).
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), TransportError>;

    /// Remove every handler registered for a topic.
    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;
}

/// Failure at the transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("unsubscribe from '{topic}' failed: {reason}")]
    Unsubscribe { topic: String, reason: String },
}
