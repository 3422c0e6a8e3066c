//! The ticket registry facade.
//!
//! [`TicketRegistry`] wraps a [`Store`] running the [`TicketReducer`] and exposes the
//! registry operations with typed arguments and results. It is the layer that logs
//! and records metrics; the reducer stays pure.
//!
//! All commands serialize on the store's write lock. Reads share the read lock and
//! always see the state between two complete commands.

use crate::aggregates::{TicketAction, TicketEnvironment, TicketReducer};
use crate::error::RegistryError;
use crate::metrics::{self, Command};
use crate::notifications::TicketEvent;
use crate::persistence::{PersistenceError, RegistrySnapshot};
use crate::types::{EventId, Identity, RegistryState, SecretHash, StatusCounts, Ticket, TicketId};
use std::time::Instant;
use ticketgate_runtime::Store;
use tokio::sync::broadcast;

/// Store type behind a [`TicketRegistry`]
pub type RegistryStore = Store<RegistryState, TicketAction, TicketEnvironment, TicketReducer>;

/// The ticket registry
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct TicketRegistry {
    store: RegistryStore,
}

impl TicketRegistry {
    /// Create an empty registry controlled by `organizer`
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidArgument`] if `organizer` is blank.
    pub fn new(
        organizer: impl Into<Identity>,
        env: TicketEnvironment,
    ) -> Result<Self, RegistryError> {
        let organizer = organizer.into();
        if organizer.is_blank() {
            return Err(RegistryError::InvalidArgument {
                field: "organizer",
                reason: "must not be empty",
            });
        }

        tracing::info!(%organizer, topic = %env.topic, "Ticket registry created");
        Ok(Self::from_state(RegistryState::new(organizer), env))
    }

    /// Restore a registry from a snapshot
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the snapshot violates a registry invariant.
    pub fn from_snapshot(
        snapshot: RegistrySnapshot,
        env: TicketEnvironment,
    ) -> Result<Self, PersistenceError> {
        let state = snapshot.restore()?;
        tracing::info!(
            organizer = %state.organizer(),
            tickets = state.len(),
            "Ticket registry restored from snapshot"
        );
        Ok(Self::from_state(state, env))
    }

    /// Rebuild a registry by replaying its notification log
    ///
    /// Replayed events are not published again.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] for the first event that could not have
    /// been committed.
    pub fn from_events<I>(
        organizer: impl Into<Identity>,
        events: I,
        env: TicketEnvironment,
    ) -> Result<Self, PersistenceError>
    where
        I: IntoIterator<Item = TicketEvent>,
    {
        let state = RegistryState::replay(organizer.into(), events)?;
        tracing::info!(
            organizer = %state.organizer(),
            tickets = state.len(),
            "Ticket registry rebuilt from event log"
        );
        Ok(Self::from_state(state, env))
    }

    fn from_state(state: RegistryState, env: TicketEnvironment) -> Self {
        let capacity = env.subscriber_capacity;
        Self {
            store: Store::with_broadcast_capacity(state, TicketReducer::new(), env, capacity),
        }
    }

    // ========== Commands ==========

    /// Issue a ticket to `to` for `event_id` (organizer only)
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Unauthorized`] if `caller` is not the organizer
    /// - [`RegistryError::InvalidArgument`] if `to` is blank or `secret_hash` is empty
    pub async fn issue(
        &self,
        caller: impl Into<Identity>,
        to: impl Into<Identity>,
        secret_hash: impl Into<SecretHash>,
        event_id: EventId,
    ) -> Result<TicketId, RegistryError> {
        let caller = caller.into();
        let owner = to.into();
        let started = Instant::now();

        let result = self
            .store
            .send(TicketAction::IssueTicket {
                caller: caller.clone(),
                owner: owner.clone(),
                secret_hash: secret_hash.into(),
                event_id,
            })
            .await
            .and_then(|emitted| {
                emitted
                    .iter()
                    .find_map(TicketAction::issued_ticket_id)
                    .ok_or(RegistryError::MissingOutcome { command: "issue" })
            });

        match result {
            Ok(ticket_id) => {
                metrics::record_committed(Command::Issue, started.elapsed());
                tracing::info!(%ticket_id, %caller, %owner, %event_id, "Ticket issued");
                Ok(ticket_id)
            },
            Err(error) => Err(Self::rejected(Command::Issue, &caller, error, started)),
        }
    }

    /// Present `candidate` for `ticket_id`; any caller may validate
    ///
    /// Returns `true` when the ticket was valid and is now used. Of any number of
    /// concurrent validations of one ticket, exactly one returns `true`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] if the ticket does not exist
    /// - [`RegistryError::AlreadyFinalized`] if it is used or revoked
    /// - [`RegistryError::HashMismatch`] if `candidate` is not the ticket's secret
    pub async fn validate(
        &self,
        caller: impl Into<Identity>,
        ticket_id: TicketId,
        candidate: impl Into<SecretHash>,
    ) -> Result<bool, RegistryError> {
        let caller = caller.into();
        let started = Instant::now();

        let result = self
            .store
            .send(TicketAction::ValidateTicket {
                caller: caller.clone(),
                ticket_id,
                candidate: candidate.into(),
            })
            .await;

        match result {
            Ok(_) => {
                metrics::record_committed(Command::Validate, started.elapsed());
                tracing::info!(%ticket_id, validator = %caller, "Ticket validated");
                Ok(true)
            },
            Err(error) => Err(Self::rejected(Command::Validate, &caller, error, started)),
        }
    }

    /// Revoke `ticket_id` (organizer only)
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Unauthorized`] if `caller` is not the organizer
    /// - [`RegistryError::NotFound`] if the ticket does not exist
    /// - [`RegistryError::AlreadyFinalized`] if it is used or revoked
    pub async fn revoke(
        &self,
        caller: impl Into<Identity>,
        ticket_id: TicketId,
    ) -> Result<(), RegistryError> {
        let caller = caller.into();
        let started = Instant::now();

        let result = self
            .store
            .send(TicketAction::RevokeTicket {
                caller: caller.clone(),
                ticket_id,
            })
            .await;

        match result {
            Ok(_) => {
                metrics::record_committed(Command::Revoke, started.elapsed());
                tracing::info!(%ticket_id, revoker = %caller, "Ticket revoked");
                Ok(())
            },
            Err(error) => Err(Self::rejected(Command::Revoke, &caller, error, started)),
        }
    }

    fn rejected(
        command: Command,
        caller: &Identity,
        error: RegistryError,
        started: Instant,
    ) -> RegistryError {
        metrics::record_rejected(command, &error, started.elapsed());
        tracing::warn!(
            command = command.as_str(),
            %caller,
            kind = error.kind().as_str(),
            %error,
            "Command rejected"
        );
        error
    }

    // ========== Queries ==========

    /// Owned copy of one ticket
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the ticket does not exist.
    pub async fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, RegistryError> {
        self.store
            .state(|state| state.get(ticket_id).cloned())
            .await
            .ok_or(RegistryError::NotFound(ticket_id))
    }

    /// The organizer identity
    pub async fn organizer(&self) -> Identity {
        self.store.state(|state| state.organizer().clone()).await
    }

    /// Identifier the next successful issuance will receive
    pub async fn next_ticket_id(&self) -> TicketId {
        self.store.state(RegistryState::next_id).await
    }

    /// Number of tickets ever issued
    pub async fn ticket_count(&self) -> usize {
        self.store.state(RegistryState::len).await
    }

    /// Tickets for one event, ordered by identifier
    pub async fn tickets_for_event(&self, event_id: EventId) -> Vec<Ticket> {
        self.store
            .state(|state| state.tickets_for_event(event_id))
            .await
    }

    /// Tickets held by `owner`, ordered by identifier
    pub async fn tickets_owned_by(&self, owner: &Identity) -> Vec<Ticket> {
        self.store
            .state(|state| state.tickets_owned_by(owner))
            .await
    }

    /// Totals per status
    pub async fn status_counts(&self) -> StatusCounts {
        self.store.state(RegistryState::status_counts).await
    }

    /// Consistent snapshot for external storage
    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.store.state(RegistrySnapshot::capture).await
    }

    /// Observe committed events in commit order
    ///
    /// Each receiver buffers the environment's `subscriber_capacity` events.
    /// Receivers that fall further behind skip ahead and see `RecvError::Lagged`.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TicketAction> {
        self.store.subscribe_actions()
    }

    /// The environment commands run with
    #[must_use]
    pub const fn environment(&self) -> &TicketEnvironment {
        self.store.environment()
    }
}

impl std::fmt::Debug for TicketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketRegistry")
            .field("environment", self.store.environment())
            .finish_non_exhaustive()
    }
}
