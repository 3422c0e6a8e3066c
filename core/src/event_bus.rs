//! Event bus abstraction for publishing notifications to external consumers.
//!
//! Reducers never talk to a bus directly. They return [`Effect::Publish`] values
//! carrying a [`SerializedEvent`] and the bus to use; the store executes them while
//! it still holds the write lock, so every bus observes events in commit order.
//!
//! # Key Principles
//!
//! - **Fire-and-forget**: a failed publish is reported, never rolled back into state
//! - **Synchronous**: publishing must be bounded and must not block on I/O; slow
//!   consumers belong behind a channel
//! - **Ordered**: events reach the bus in the order their mutations committed
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (ticketgate-testing) - records everything, for tests
//! - `BroadcastEventBus` (ticketgate) - fans out to `tokio` broadcast subscribers
//!
//! [`Effect::Publish`]: crate::effect::Effect::Publish

use crate::event::SerializedEvent;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Topic not found or invalid
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}

/// Trait for event bus implementations.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; the store shares one bus between
/// every task that sends it actions.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError`] if the event could not be handed to the bus.
    fn publish(&self, topic: &str, event: &SerializedEvent) -> Result<(), EventBusError>;
}
