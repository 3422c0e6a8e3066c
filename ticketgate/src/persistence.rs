//! Persisted layout of the registry and the two ways to rebuild it.
//!
//! Storage itself is external. The registry hands out a [`RegistrySnapshot`] (ticket
//! table, organizer, next-ID counter) and can be rebuilt either from such a snapshot
//! or by replaying its notification log. Both paths re-check the registry
//! invariants, so a corrupted store is reported instead of silently loaded.

use crate::aggregates::TicketReducer;
use crate::notifications::TicketEvent;
use crate::types::{Identity, RegistryState, Ticket, TicketId, TicketStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use ticketgate_core::event::{EventError, SerializedEvent};

/// Why persisted registry data was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The organizer identity is blank
    #[error("organizer must not be empty")]
    EmptyOrganizer,

    /// Ticket identifiers are not exactly `1..=n` in order
    #[error("expected ticket {expected}, found ticket {found}")]
    NonDenseIds {
        /// Identifier that should come next
        expected: TicketId,
        /// Identifier actually found
        found: TicketId,
    },

    /// The stored counter disagrees with the ticket table
    #[error("next id is {found} but the ticket table implies {expected}")]
    NextIdMismatch {
        /// `max id + 1`
        expected: TicketId,
        /// Stored counter
        found: TicketId,
    },

    /// A stored ticket has a blank owner or an empty secret
    #[error("ticket {0} is malformed")]
    MalformedTicket(TicketId),

    /// An event refers to a ticket that was never issued
    #[error("event refers to unknown ticket {0}")]
    UnknownTicket(TicketId),

    /// An event moves a ticket out of a terminal state
    #[error("ticket {ticket_id} is already {status}")]
    IllegalTransition {
        /// Ticket
        ticket_id: TicketId,
        /// Its status when the event arrived
        status: TicketStatus,
    },

    /// An organizer-only event was recorded for someone else
    #[error("ticket {ticket_id} was changed by '{actor}', who is not the organizer")]
    NotOrganizer {
        /// Ticket
        ticket_id: TicketId,
        /// Recorded actor
        actor: Identity,
    },

    /// Bytes or JSON could not be encoded or decoded
    #[error("snapshot codec error: {0}")]
    Codec(String),

    /// A logged notification could not be decoded
    #[error(transparent)]
    Event(#[from] EventError),
}

/// Everything needed to restore a registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Organizer identity
    pub organizer: Identity,
    /// Identifier the next issuance receives
    pub next_id: TicketId,
    /// Ticket table, ordered by identifier
    pub tickets: Vec<Ticket>,
}

impl RegistrySnapshot {
    /// Capture `state`
    #[must_use]
    pub fn capture(state: &RegistryState) -> Self {
        Self {
            organizer: state.organizer().clone(),
            next_id: state.next_id(),
            tickets: state.tickets().cloned().collect(),
        }
    }

    /// Check the invariants and rebuild the state
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] naming the first violated invariant.
    pub fn restore(self) -> Result<RegistryState, PersistenceError> {
        if self.organizer.is_blank() {
            return Err(PersistenceError::EmptyOrganizer);
        }

        let mut expected = TicketId::FIRST;
        let mut tickets = BTreeMap::new();
        for ticket in self.tickets {
            if ticket.id() != expected {
                return Err(PersistenceError::NonDenseIds {
                    expected,
                    found: ticket.id(),
                });
            }
            if ticket.owner().is_blank() || ticket.secret_hash().is_empty() {
                return Err(PersistenceError::MalformedTicket(ticket.id()));
            }
            expected = expected.next();
            tickets.insert(ticket.id(), ticket);
        }

        if self.next_id != expected {
            return Err(PersistenceError::NextIdMismatch {
                expected,
                found: self.next_id,
            });
        }

        Ok(RegistryState::from_parts(self.organizer, self.next_id, tickets))
    }

    /// Encode with `bincode`
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Codec`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        bincode::serialize(self).map_err(|e| PersistenceError::Codec(e.to_string()))
    }

    /// Decode from `bincode`
    ///
    /// Decoding does not check invariants; [`RegistrySnapshot::restore`] does.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Codec`] if the bytes are not a snapshot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistenceError> {
        bincode::deserialize(bytes).map_err(|e| PersistenceError::Codec(e.to_string()))
    }

    /// Encode as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Codec`] if encoding fails.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(|e| PersistenceError::Codec(e.to_string()))
    }

    /// Decode from JSON
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Codec`] if the text is not a snapshot.
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(json).map_err(|e| PersistenceError::Codec(e.to_string()))
    }
}

impl RegistryState {
    /// Rebuild state by replaying a notification log in commit order
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] for the first event that could not have been
    /// committed by a registry controlled by `organizer`.
    pub fn replay<I>(organizer: Identity, events: I) -> Result<Self, PersistenceError>
    where
        I: IntoIterator<Item = TicketEvent>,
    {
        if organizer.is_blank() {
            return Err(PersistenceError::EmptyOrganizer);
        }

        let mut state = Self::new(organizer);
        for event in events {
            check_replayable(&state, &event)?;
            TicketReducer::apply_event(&mut state, &event.into_action());
        }
        Ok(state)
    }

    /// Decode and replay a log of published notifications
    ///
    /// # Errors
    ///
    /// As [`RegistryState::replay`], plus [`PersistenceError::Event`] for entries
    /// that are not ticket notifications.
    pub fn replay_serialized(
        organizer: Identity,
        log: &[SerializedEvent],
    ) -> Result<Self, PersistenceError> {
        let events = log
            .iter()
            .map(TicketEvent::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Self::replay(organizer, events)
    }
}

fn check_replayable(state: &RegistryState, event: &TicketEvent) -> Result<(), PersistenceError> {
    match event {
        TicketEvent::Issued {
            ticket_id,
            owner,
            secret_hash,
            issued_by,
            ..
        } => {
            if *ticket_id != state.next_id() {
                return Err(PersistenceError::NonDenseIds {
                    expected: state.next_id(),
                    found: *ticket_id,
                });
            }
            if !state.is_organizer(issued_by) {
                return Err(PersistenceError::NotOrganizer {
                    ticket_id: *ticket_id,
                    actor: issued_by.clone(),
                });
            }
            if owner.is_blank() || secret_hash.is_empty() {
                return Err(PersistenceError::MalformedTicket(*ticket_id));
            }
        },

        TicketEvent::Validated { ticket_id, .. } => {
            check_still_valid(state, *ticket_id)?;
        },

        TicketEvent::Revoked {
            ticket_id, revoker, ..
        } => {
            check_still_valid(state, *ticket_id)?;
            if !state.is_organizer(revoker) {
                return Err(PersistenceError::NotOrganizer {
                    ticket_id: *ticket_id,
                    actor: revoker.clone(),
                });
            }
        },
    }
    Ok(())
}

fn check_still_valid(state: &RegistryState, ticket_id: TicketId) -> Result<(), PersistenceError> {
    let ticket = state
        .get(ticket_id)
        .ok_or(PersistenceError::UnknownTicket(ticket_id))?;
    if ticket.status().is_final() {
        return Err(PersistenceError::IllegalTransition {
            ticket_id,
            status: ticket.status(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventId, SecretHash};
    use chrono::Utc;

    fn organizer() -> Identity {
        Identity::new("org")
    }

    fn issued(id: u64) -> TicketEvent {
        TicketEvent::Issued {
            ticket_id: TicketId::new(id),
            owner: Identity::new("alice"),
            event_id: EventId::new(42),
            secret_hash: SecretHash::new(format!("h{id}")),
            issued_by: organizer(),
            issued_at: Utc::now(),
        }
    }

    fn validated(id: u64) -> TicketEvent {
        TicketEvent::Validated {
            ticket_id: TicketId::new(id),
            validator: Identity::new("gate"),
            validated_at: Utc::now(),
        }
    }

    #[test]
    fn replay_rebuilds_statuses() {
        let state = RegistryState::replay(
            organizer(),
            vec![
                issued(1),
                issued(2),
                validated(1),
                TicketEvent::Revoked {
                    ticket_id: TicketId::new(2),
                    revoker: organizer(),
                    revoked_at: Utc::now(),
                },
            ],
        )
        .unwrap();

        let counts = state.status_counts();
        assert_eq!((counts.valid, counts.used, counts.revoked), (0, 1, 1));
        assert_eq!(state.next_id(), TicketId::new(3));
    }

    #[test]
    fn replay_rejects_gaps_and_double_use() {
        assert_eq!(
            RegistryState::replay(organizer(), vec![issued(1), issued(3)]),
            Err(PersistenceError::NonDenseIds {
                expected: TicketId::new(2),
                found: TicketId::new(3),
            })
        );
        assert_eq!(
            RegistryState::replay(organizer(), vec![validated(1)]),
            Err(PersistenceError::UnknownTicket(TicketId::new(1)))
        );
        assert_eq!(
            RegistryState::replay(organizer(), vec![issued(1), validated(1), validated(1)]),
            Err(PersistenceError::IllegalTransition {
                ticket_id: TicketId::new(1),
                status: TicketStatus::Used,
            })
        );
    }

    #[test]
    fn replay_rejects_foreign_issuer() {
        let result = RegistryState::replay(Identity::new("someone-else"), vec![issued(1)]);
        assert!(matches!(result, Err(PersistenceError::NotOrganizer { .. })));
    }

    #[test]
    fn snapshot_restore_checks_counter() {
        let state = RegistryState::replay(organizer(), vec![issued(1), issued(2)]).unwrap();
        let mut snapshot = RegistrySnapshot::capture(&state);
        assert_eq!(snapshot.clone().restore().unwrap(), state);

        snapshot.next_id = TicketId::new(7);
        assert_eq!(
            snapshot.restore(),
            Err(PersistenceError::NextIdMismatch {
                expected: TicketId::new(3),
                found: TicketId::new(7),
            })
        );
    }

    #[test]
    fn snapshot_rejects_duplicates_and_blank_organizer() {
        let state = RegistryState::replay(organizer(), vec![issued(1)]).unwrap();
        let mut snapshot = RegistrySnapshot::capture(&state);
        snapshot.tickets.push(snapshot.tickets[0].clone());
        assert!(matches!(
            snapshot.clone().restore(),
            Err(PersistenceError::NonDenseIds { .. })
        ));

        snapshot.organizer = Identity::new(" ");
        assert_eq!(snapshot.restore(), Err(PersistenceError::EmptyOrganizer));
    }

    #[test]
    fn undecodable_bytes_are_rejected() {
        assert!(matches!(
            RegistrySnapshot::from_bytes(&[0xff, 0x01]),
            Err(PersistenceError::Codec(_))
        ));
        assert!(matches!(
            RegistrySnapshot::from_json("{\"organizer\": 5}"),
            Err(PersistenceError::Codec(_))
        ));
    }
}
