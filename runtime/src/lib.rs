//! # Ticketgate Runtime
//!
//! Runtime implementation for the Ticketgate reducer architecture.
//!
//! This crate provides the [`Store`], which owns a reducer's state and is the only
//! way to change it.
//!
//! ## Core Components
//!
//! - **Store**: state behind a `RwLock`, one writer at a time
//! - **Effect execution**: emitted actions go back to the sender and to observers,
//!   published events go to their bus, all before the write lock is released
//!
//! ## Example
//!
//! ```ignore
//! use ticketgate_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action; get back the actions it emitted
//! let emitted = store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use std::sync::Arc;
use ticketgate_core::{SmallVec, effect::Effect, reducer::Reducer};
use tokio::sync::RwLock;

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{Arc, Effect, Reducer, RwLock, SmallVec};
    use tokio::sync::broadcast;

    /// Default capacity of the action broadcast channel
    pub const DEFAULT_BROADCAST_CAPACITY: usize = 16;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution
    ///
    /// # Consistency
    ///
    /// Every `send` runs the reducer and all of its effects while holding the
    /// write lock. Check-then-mutate logic inside a reducer is therefore atomic
    /// with respect to every other `send`, and readers going through
    /// [`Store::state`] never see a half-applied action.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        /// Action broadcast channel for observing emitted actions.
        ///
        /// Every action a reducer emits (via `Effect::Emit`) is broadcast to
        /// observers after it has been committed.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// The action broadcast channel buffers [`DEFAULT_BROADCAST_CAPACITY`]
        /// actions; use [`Store::with_broadcast_capacity`] for more.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(
                initial_state,
                reducer,
                environment,
                DEFAULT_BROADCAST_CAPACITY,
            )
        }

        /// Create a new Store with custom action broadcast capacity
        ///
        /// A capacity of zero is raised to one; slow observers lag rather than
        /// block the store.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                action_broadcast,
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires the write lock on state
        /// 2. Calls the reducer with (state, action, environment)
        /// 3. Executes the returned effects in order
        /// 4. Releases the lock
        ///
        /// # Returns
        ///
        /// The actions the reducer emitted, in emission order.
        ///
        /// # Errors
        ///
        /// Returns the reducer's error when it rejects the action. No effect
        /// runs and the state is unchanged.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<SmallVec<[A; 4]>, R::Error> {
            let mut state = self.state.write().await;

            // Rejections are counted and logged by the caller, which knows the command
            let effects = self.reducer.reduce(&mut *state, action, &self.environment)?;

            metrics::counter!("store.actions.processed").increment(1);

            let mut emitted = SmallVec::new();
            for effect in effects {
                self.execute_effect(effect, &mut emitted);
            }

            drop(state);
            Ok(emitted)
        }

        /// Read state through a closure under the read lock
        ///
        /// Readers run concurrently with each other and always observe the state
        /// between two complete `send` calls.
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Subscribe to all actions emitted by this store
        ///
        /// # Notes
        ///
        /// - Only actions emitted through `Effect::Emit` are broadcast
        /// - If the receiver lags, it skips old actions and receives `RecvError::Lagged`
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Access the injected environment
        #[must_use]
        pub const fn environment(&self) -> &E {
            &self.environment
        }

        fn execute_effect(&self, effect: Effect<A>, emitted: &mut SmallVec<[A; 4]>) {
            match effect {
                Effect::Emit(action) => {
                    // No receivers is fine: observers are optional
                    let _ = self.action_broadcast.send(action.clone());
                    emitted.push(action);
                },
                Effect::Publish { bus, topic, event } => {
                    if let Err(error) = bus.publish(&topic, &event) {
                        metrics::counter!("store.effects.publish_failed").increment(1);
                        tracing::warn!(
                            %error,
                            topic = %topic,
                            event_type = %event.event_type,
                            "Event publication failed; state change stands"
                        );
                    } else {
                        tracing::debug!(topic = %topic, event_type = %event.event_type, "Event published");
                    }
                },
            }
        }
    }
}

pub use store::Store;
