//! # Ticketgate Testing
//!
//! Testing utilities and helpers for the Ticketgate reducer architecture.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - A Given-When-Then harness for reducers
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use ticketgate_testing::{InMemoryEventBus, test_clock};
//! use ticketgate_runtime::Store;
//!
//! #[tokio::test]
//! async fn test_issue_flow() {
//!     let bus = Arc::new(InMemoryEventBus::new());
//!     let env = TicketEnvironment::new(Arc::new(test_clock()), bus.clone(), "ticket-events");
//!     let store = Store::new(RegistryState::new(organizer), TicketReducer::new(), env);
//!
//!     store.send(TicketAction::IssueTicket { .. }).await?;
//!
//!     assert_eq!(bus.len(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use ticketgate_core::environment::Clock;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError};
    use ticketgate_core::event::SerializedEvent;
    use ticketgate_core::event_bus::{EventBus, EventBusError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticketgate_testing::mocks::FixedClock;
    /// use ticketgate_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// In-memory event bus that records every publication in order
    ///
    /// Switch it into failing mode with [`InMemoryEventBus::set_failing`] to
    /// check that publication failures never affect committed state.
    #[derive(Debug, Default)]
    pub struct InMemoryEventBus {
        published: Mutex<Vec<(String, SerializedEvent)>>,
        failing: AtomicBool,
    }

    impl InMemoryEventBus {
        /// Create an empty bus
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make subsequent publications fail (or succeed again)
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Everything published so far, as `(topic, event)` pairs
        #[must_use]
        pub fn published(&self) -> Vec<(String, SerializedEvent)> {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Events published on one topic, in order
        #[must_use]
        pub fn events_on(&self, topic: &str) -> Vec<SerializedEvent> {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|(t, _)| t == topic)
                .map(|(_, event)| event.clone())
                .collect()
        }

        /// Number of successful publications
        #[must_use]
        pub fn len(&self) -> usize {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Whether nothing has been published
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl EventBus for InMemoryEventBus {
        fn publish(&self, topic: &str, event: &SerializedEvent) -> Result<(), EventBusError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: "in-memory bus set to fail".to_string(),
                });
            }

            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((topic.to_string(), event.clone()));
            Ok(())
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, InMemoryEventBus, test_clock};
pub use reducer_test::{ReducerTest, assertions};
