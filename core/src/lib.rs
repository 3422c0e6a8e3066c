//! # Ticketgate Core
//!
//! Core traits and types for the Ticketgate reducer architecture.
//!
//! Business rules are written as reducers: a reducer validates an action against
//! the current state and, only when every check passes, mutates the state and
//! describes the side effects that should follow. A rejected action leaves the
//! state exactly as it was.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state owned by a store
//! - **Action**: All inputs to a reducer (commands and the events they produce)
//! - **Reducer**: `(State, Action, Environment) → Result<Effects, Error>`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use ticketgate_core::*;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = CounterEnvironment;
//!     type Error = CounterError;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         env: &CounterEnvironment,
//!     ) -> Result<SmallVec<[Effect<CounterAction>; 4]>, CounterError> {
//!         if state.count == u32::MAX {
//!             return Err(CounterError::Overflow);
//!         }
//!         state.count += 1;
//!         Ok(smallvec![Effect::Emit(CounterAction::Incremented)])
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Event trait and serialized event wire format
pub mod event;

/// Event bus abstraction for publishing notifications
pub mod event_bus;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Result<Effects, Error>`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Error`: Why an action was rejected
    ///
    /// # Contract
    ///
    /// Implementations must validate before they mutate: when `reduce` returns
    /// `Err`, `state` must be left untouched.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The rejection type returned for invalid actions
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place (only if validation passed)
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is rejected. The state is unchanged.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Effect<Self::Action>; 4]>, Self::Error>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution).
pub mod effect {
    use crate::event::SerializedEvent;
    use crate::event_bus::EventBus;
    use std::sync::Arc;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    pub enum Effect<Action> {
        /// Report a committed action back to the sender and to store observers
        Emit(Action),

        /// Publish a serialized event to an event bus topic
        ///
        /// Publication is fire-and-forget: a failing bus never undoes the
        /// state change that produced the event.
        Publish {
            /// Bus to publish on
            bus: Arc<dyn EventBus>,
            /// Topic name
            topic: String,
            /// Serialized payload
            event: SerializedEvent,
        },
    }

    // Manual Debug implementation since EventBus trait objects don't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::Emit(action) => f.debug_tuple("Effect::Emit").field(action).finish(),
                Effect::Publish { topic, event, .. } => f
                    .debug_struct("Effect::Publish")
                    .field("topic", topic)
                    .field("event", event)
                    .finish_non_exhaustive(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Action emitted by this effect, if any
        #[must_use]
        pub const fn emitted(&self) -> Option<&Action> {
            match self {
                Effect::Emit(action) => Some(action),
                Effect::Publish { .. } => None,
            }
        }

        /// Serialized event published by this effect, with its topic
        #[must_use]
        pub fn published(&self) -> Option<(&str, &SerializedEvent)> {
            match self {
                Effect::Publish { topic, event, .. } => Some((topic.as_str(), event)),
                Effect::Emit(_) => None,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Production code uses [`SystemClock`]; tests inject a fixed clock so
    /// timestamps are deterministic.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::event::SerializedEvent;
    use super::event_bus::{EventBus, EventBusError};
    use std::sync::Arc;

    struct NullBus;

    impl EventBus for NullBus {
        fn publish(&self, _topic: &str, _event: &SerializedEvent) -> Result<(), EventBusError> {
            Ok(())
        }
    }

    #[test]
    fn emitted_and_published_select_their_variant() {
        let effects: Vec<Effect<i32>> = vec![
            Effect::Emit(1),
            Effect::Publish {
                bus: Arc::new(NullBus),
                topic: "counter-events".to_string(),
                event: SerializedEvent::new("Counted.v1".to_string(), vec![1]),
            },
            Effect::Emit(2),
        ];

        let emitted: Vec<i32> = effects.iter().filter_map(Effect::emitted).copied().collect();
        assert_eq!(emitted, vec![1, 2]);

        let published: Vec<_> = effects.iter().filter_map(Effect::published).collect();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "counter-events");
        assert_eq!(published[0].1.event_type, "Counted.v1");
    }

    #[test]
    fn debug_hides_bus() {
        let effect: Effect<i32> = Effect::Publish {
            bus: Arc::new(NullBus),
            topic: "t".to_string(),
            event: SerializedEvent::new("E.v1".to_string(), vec![]),
        };
        let rendered = format!("{effect:?}");
        assert!(rendered.starts_with("Effect::Publish"));
        assert!(rendered.contains("E.v1"));
    }
}
