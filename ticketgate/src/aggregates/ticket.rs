//! Ticket aggregate for the ticket registry.
//!
//! Owns the ticket lifecycle: `Valid → Used` on validation, `Valid → Revoked` on
//! revocation. Both terminal states are final.
//!
//! **Concurrency Strategy**: the reducer runs under the store's write lock, so the
//! status check and the status change of one command can never interleave with
//! another command. Of two racing validations, the second sees `Used`.

use crate::error::RegistryError;
use crate::notifications::TicketEvent;
use crate::types::{EventId, Identity, RegistryState, SecretHash, Ticket, TicketId, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketgate_core::{
    SmallVec, effect::Effect, environment::Clock, event::SerializedEvent, event_bus::EventBus,
    reducer::Reducer, smallvec,
};
use ticketgate_runtime::store::DEFAULT_BROADCAST_CAPACITY;

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the Ticket aggregate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketAction {
    // Commands
    /// Issue a new ticket (organizer only)
    IssueTicket {
        /// Identity making the request
        caller: Identity,
        /// Holder of the new ticket
        owner: Identity,
        /// Verification secret
        secret_hash: SecretHash,
        /// Event the ticket admits to
        event_id: EventId,
    },

    /// Present a ticket's secret at the gate (any caller)
    ValidateTicket {
        /// Identity presenting the ticket
        caller: Identity,
        /// Ticket being presented
        ticket_id: TicketId,
        /// Secret read from the ticket
        candidate: SecretHash,
    },

    /// Invalidate a ticket (organizer only)
    RevokeTicket {
        /// Identity making the request
        caller: Identity,
        /// Ticket to revoke
        ticket_id: TicketId,
    },

    // Events
    /// A ticket was issued
    TicketIssued {
        /// New ticket
        ticket_id: TicketId,
        /// Holder
        owner: Identity,
        /// Event the ticket admits to
        event_id: EventId,
        /// Verification secret
        secret_hash: SecretHash,
        /// Organizer who issued it
        issued_by: Identity,
        /// When it was issued
        issued_at: DateTime<Utc>,
    },

    /// A ticket was validated and is now used
    TicketValidated {
        /// Ticket
        ticket_id: TicketId,
        /// Who presented it
        validator: Identity,
        /// When
        validated_at: DateTime<Utc>,
    },

    /// A ticket was revoked
    TicketRevoked {
        /// Ticket
        ticket_id: TicketId,
        /// Organizer who revoked it
        revoker: Identity,
        /// When
        revoked_at: DateTime<Utc>,
    },
}

impl TicketAction {
    /// Whether this action is a command
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::IssueTicket { .. } | Self::ValidateTicket { .. } | Self::RevokeTicket { .. }
        )
    }

    /// Whether this action is an event
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !self.is_command()
    }

    /// Identifier assigned by a `TicketIssued` event
    #[must_use]
    pub const fn issued_ticket_id(&self) -> Option<TicketId> {
        match self {
            Self::TicketIssued { ticket_id, .. } => Some(*ticket_id),
            _ => None,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the Ticket aggregate
#[derive(Clone)]
pub struct TicketEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Event bus for notifications
    pub event_bus: Arc<dyn EventBus>,
    /// Topic notifications are published on
    pub topic: String,
    /// Committed events buffered per registry subscriber before it lags
    pub subscriber_capacity: usize,
}

impl TicketEnvironment {
    /// Creates a new `TicketEnvironment`
    ///
    /// Subscribers get [`DEFAULT_BROADCAST_CAPACITY`] slots; see
    /// [`TicketEnvironment::with_subscriber_capacity`].
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_bus: Arc<dyn EventBus>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            clock,
            event_bus,
            topic: topic.into(),
            subscriber_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }

    /// Buffer `capacity` committed events per subscriber (at least one)
    #[must_use]
    pub fn with_subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }
}

impl std::fmt::Debug for TicketEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketEnvironment")
            .field("topic", &self.topic)
            .field("subscriber_capacity", &self.subscriber_capacity)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the Ticket aggregate
///
/// Every command is validated in full before anything is applied. A rejected
/// command returns its [`RegistryError`] and leaves the state untouched.
#[derive(Clone, Debug)]
pub struct TicketReducer;

impl TicketReducer {
    /// Creates a new `TicketReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Effects for a committed event: report it, then publish it
    fn create_effects(
        event: TicketAction,
        env: &TicketEnvironment,
    ) -> SmallVec<[Effect<TicketAction>; 4]> {
        let published = TicketEvent::from_action(&event)
            .and_then(|notification| SerializedEvent::from_event(&notification).ok());

        match published {
            Some(serialized) => smallvec![
                Effect::Emit(event),
                Effect::Publish {
                    bus: Arc::clone(&env.event_bus),
                    topic: env.topic.clone(),
                    event: serialized,
                },
            ],
            None => {
                tracing::warn!(?event, "Notification could not be serialized; not published");
                smallvec![Effect::Emit(event)]
            },
        }
    }

    /// Validates `IssueTicket` command
    fn validate_issue(
        state: &RegistryState,
        caller: &Identity,
        owner: &Identity,
        secret_hash: &SecretHash,
    ) -> Result<(), RegistryError> {
        if !state.is_organizer(caller) {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
            });
        }

        if owner.is_blank() {
            return Err(RegistryError::InvalidArgument {
                field: "owner",
                reason: "must not be empty",
            });
        }

        if secret_hash.is_empty() {
            return Err(RegistryError::InvalidArgument {
                field: "secret_hash",
                reason: "must not be empty",
            });
        }

        Ok(())
    }

    /// Validates `ValidateTicket` command
    ///
    /// CRITICAL: the status check precedes the hash check, so a finalized ticket
    /// reports `AlreadyFinalized` whatever secret is presented.
    fn validate_validate(
        state: &RegistryState,
        ticket_id: TicketId,
        candidate: &SecretHash,
    ) -> Result<(), RegistryError> {
        let ticket = state
            .get(ticket_id)
            .ok_or(RegistryError::NotFound(ticket_id))?;

        if !ticket.status().is_valid() {
            return Err(RegistryError::AlreadyFinalized(ticket_id));
        }

        if !ticket.secret_hash().matches(candidate) {
            return Err(RegistryError::HashMismatch(ticket_id));
        }

        Ok(())
    }

    /// Validates `RevokeTicket` command
    fn validate_revoke(
        state: &RegistryState,
        caller: &Identity,
        ticket_id: TicketId,
    ) -> Result<(), RegistryError> {
        if !state.is_organizer(caller) {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
            });
        }

        let ticket = state
            .get(ticket_id)
            .ok_or(RegistryError::NotFound(ticket_id))?;

        if !ticket.status().is_valid() {
            return Err(RegistryError::AlreadyFinalized(ticket_id));
        }

        Ok(())
    }

    /// Applies an event to state
    ///
    /// Callers check the event against the state first: the command validators
    /// for live commands, the replay checks for a rebuilt log. Events on unknown
    /// tickets are ignored and an already taken identifier is never overwritten.
    pub(crate) fn apply_event(state: &mut RegistryState, action: &TicketAction) {
        match action {
            TicketAction::TicketIssued {
                ticket_id,
                owner,
                event_id,
                secret_hash,
                issued_at,
                ..
            } => {
                let inserted = state.insert_issued(Ticket::issue(
                    *ticket_id,
                    owner.clone(),
                    secret_hash.clone(),
                    *event_id,
                    *issued_at,
                ));
                if !inserted {
                    tracing::error!(%ticket_id, "Issued event for a taken identifier ignored");
                }
            },

            TicketAction::TicketValidated { ticket_id, .. } => {
                if let Some(ticket) = state.get_mut(*ticket_id) {
                    ticket.set_status(TicketStatus::Used);
                }
            },

            TicketAction::TicketRevoked { ticket_id, .. } => {
                if let Some(ticket) = state.get_mut(*ticket_id) {
                    ticket.set_status(TicketStatus::Revoked);
                }
            },

            // Commands don't modify state directly
            TicketAction::IssueTicket { .. }
            | TicketAction::ValidateTicket { .. }
            | TicketAction::RevokeTicket { .. } => {},
        }
    }
}

impl Default for TicketReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for TicketReducer {
    type State = RegistryState;
    type Action = TicketAction;
    type Environment = TicketEnvironment;
    type Error = RegistryError;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<SmallVec<[Effect<Self::Action>; 4]>, Self::Error> {
        match action {
            // ========== Commands ==========
            TicketAction::IssueTicket {
                caller,
                owner,
                secret_hash,
                event_id,
            } => {
                Self::validate_issue(state, &caller, &owner, &secret_hash)?;

                let event = TicketAction::TicketIssued {
                    ticket_id: state.next_id(),
                    owner,
                    event_id,
                    secret_hash,
                    issued_by: caller,
                    issued_at: env.clock.now(),
                };
                Self::apply_event(state, &event);

                Ok(Self::create_effects(event, env))
            },

            TicketAction::ValidateTicket {
                caller,
                ticket_id,
                candidate,
            } => {
                Self::validate_validate(state, ticket_id, &candidate)?;

                let event = TicketAction::TicketValidated {
                    ticket_id,
                    validator: caller,
                    validated_at: env.clock.now(),
                };
                Self::apply_event(state, &event);

                Ok(Self::create_effects(event, env))
            },

            TicketAction::RevokeTicket { caller, ticket_id } => {
                Self::validate_revoke(state, &caller, ticket_id)?;

                let event = TicketAction::TicketRevoked {
                    ticket_id,
                    revoker: caller,
                    revoked_at: env.clock.now(),
                };
                Self::apply_event(state, &event);

                Ok(Self::create_effects(event, env))
            },

            // ========== Events ==========
            // Only the reducer records events; sending one in is a forgery
            TicketAction::TicketIssued { .. }
            | TicketAction::TicketValidated { .. }
            | TicketAction::TicketRevoked { .. } => Err(RegistryError::InvalidArgument {
                field: "action",
                reason: "events are recorded by the registry, not sent to it",
            }),
        }
    }
}
