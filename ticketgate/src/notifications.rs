//! Ticket notifications and the broadcast event bus that carries them.
//!
//! Every committed transition publishes one [`TicketEvent`] on the configured topic.
//! Consumers (audit logs, analytics) decode them with [`TicketEvent::decode`]; the
//! same log can rebuild a registry through replay.

use crate::aggregates::TicketAction;
use crate::types::{EventId, Identity, SecretHash, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketgate_core::event::{Event, EventError, SerializedEvent};
use ticketgate_core::event_bus::{EventBus, EventBusError};
use tokio::sync::broadcast;

/// Notification published for every committed ticket transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    /// A ticket was issued
    Issued {
        /// New ticket
        ticket_id: TicketId,
        /// Holder
        owner: Identity,
        /// Event the ticket is for
        event_id: EventId,
        /// Verification secret bound to the ticket
        secret_hash: SecretHash,
        /// Organizer who issued it
        issued_by: Identity,
        /// Issuance time
        issued_at: DateTime<Utc>,
    },

    /// A ticket was validated (used)
    Validated {
        /// Ticket
        ticket_id: TicketId,
        /// Gate operator who presented the secret
        validator: Identity,
        /// Validation time
        validated_at: DateTime<Utc>,
    },

    /// A ticket was revoked
    Revoked {
        /// Ticket
        ticket_id: TicketId,
        /// Organizer who revoked it
        revoker: Identity,
        /// Revocation time
        revoked_at: DateTime<Utc>,
    },
}

impl TicketEvent {
    /// Type name of [`TicketEvent::Issued`]
    pub const ISSUED: &'static str = "TicketIssued.v1";
    /// Type name of [`TicketEvent::Validated`]
    pub const VALIDATED: &'static str = "TicketValidated.v1";
    /// Type name of [`TicketEvent::Revoked`]
    pub const REVOKED: &'static str = "TicketRevoked.v1";

    /// The notification for an event action; `None` for commands
    #[must_use]
    pub fn from_action(action: &TicketAction) -> Option<Self> {
        match action {
            TicketAction::TicketIssued {
                ticket_id,
                owner,
                event_id,
                secret_hash,
                issued_by,
                issued_at,
            } => Some(Self::Issued {
                ticket_id: *ticket_id,
                owner: owner.clone(),
                event_id: *event_id,
                secret_hash: secret_hash.clone(),
                issued_by: issued_by.clone(),
                issued_at: *issued_at,
            }),
            TicketAction::TicketValidated {
                ticket_id,
                validator,
                validated_at,
            } => Some(Self::Validated {
                ticket_id: *ticket_id,
                validator: validator.clone(),
                validated_at: *validated_at,
            }),
            TicketAction::TicketRevoked {
                ticket_id,
                revoker,
                revoked_at,
            } => Some(Self::Revoked {
                ticket_id: *ticket_id,
                revoker: revoker.clone(),
                revoked_at: *revoked_at,
            }),
            TicketAction::IssueTicket { .. }
            | TicketAction::ValidateTicket { .. }
            | TicketAction::RevokeTicket { .. } => None,
        }
    }

    /// The event action this notification records
    #[must_use]
    pub fn into_action(self) -> TicketAction {
        match self {
            Self::Issued {
                ticket_id,
                owner,
                event_id,
                secret_hash,
                issued_by,
                issued_at,
            } => TicketAction::TicketIssued {
                ticket_id,
                owner,
                event_id,
                secret_hash,
                issued_by,
                issued_at,
            },
            Self::Validated {
                ticket_id,
                validator,
                validated_at,
            } => TicketAction::TicketValidated {
                ticket_id,
                validator,
                validated_at,
            },
            Self::Revoked {
                ticket_id,
                revoker,
                revoked_at,
            } => TicketAction::TicketRevoked {
                ticket_id,
                revoker,
                revoked_at,
            },
        }
    }

    /// Decode a published notification
    ///
    /// # Errors
    ///
    /// - [`EventError::UnknownEventType`] if `event_type` is not a ticket event
    /// - [`EventError::DeserializationError`] if the payload is corrupt or does
    ///   not match its declared type
    pub fn decode(serialized: &SerializedEvent) -> Result<Self, EventError> {
        if ![Self::ISSUED, Self::VALIDATED, Self::REVOKED].contains(&serialized.event_type.as_str())
        {
            return Err(EventError::UnknownEventType(serialized.event_type.clone()));
        }

        let event = Self::from_bytes(&serialized.data)?;
        if event.event_type() != serialized.event_type {
            return Err(EventError::DeserializationError(format!(
                "payload is {} but was published as {}",
                event.event_type(),
                serialized.event_type
            )));
        }
        Ok(event)
    }

    /// Ticket the notification is about
    #[must_use]
    pub const fn ticket_id(&self) -> TicketId {
        match self {
            Self::Issued { ticket_id, .. }
            | Self::Validated { ticket_id, .. }
            | Self::Revoked { ticket_id, .. } => *ticket_id,
        }
    }

    /// Identity that caused the transition
    #[must_use]
    pub const fn actor(&self) -> &Identity {
        match self {
            Self::Issued { issued_by, .. } => issued_by,
            Self::Validated { validator, .. } => validator,
            Self::Revoked { revoker, .. } => revoker,
        }
    }
}

impl Event for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Issued { .. } => Self::ISSUED,
            Self::Validated { .. } => Self::VALIDATED,
            Self::Revoked { .. } => Self::REVOKED,
        }
    }
}

/// An event as delivered to broadcast subscribers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedEvent {
    /// Topic it was published on
    pub topic: String,
    /// Serialized payload
    pub event: SerializedEvent,
}

/// Event bus that fans notifications out to `tokio` broadcast subscribers
///
/// Publishing never blocks. A subscriber that falls more than `capacity` events
/// behind skips ahead and sees `RecvError::Lagged`. Publishing while nobody is
/// subscribed drops the event.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<PublishedEvent>,
}

impl BroadcastEventBus {
    /// Create a bus buffering up to `capacity` events per subscriber (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, topic: &str, event: &SerializedEvent) -> Result<(), EventBusError> {
        if topic.is_empty() {
            return Err(EventBusError::InvalidTopic(topic.to_string()));
        }

        // Err here only means nobody is listening
        let _ = self.sender.send(PublishedEvent {
            topic: topic.to_string(),
            event: event.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issued() -> TicketEvent {
        TicketEvent::Issued {
            ticket_id: TicketId::new(1),
            owner: Identity::new("alice"),
            event_id: EventId::new(42),
            secret_hash: SecretHash::new("h1"),
            issued_by: Identity::new("org"),
            issued_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn event_types_are_versioned() {
        assert_eq!(issued().event_type(), "TicketIssued.v1");
        let validated = TicketEvent::Validated {
            ticket_id: TicketId::new(1),
            validator: Identity::new("gate-3"),
            validated_at: Utc::now(),
        };
        assert_eq!(validated.event_type(), "TicketValidated.v1");
        assert_eq!(validated.actor(), &Identity::new("gate-3"));
    }

    #[test]
    fn decode_published_event() {
        let serialized = SerializedEvent::from_event(&issued()).unwrap();
        assert_eq!(TicketEvent::decode(&serialized).unwrap(), issued());
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let serialized = SerializedEvent::new("SeatsReserved.v1".to_string(), vec![]);
        assert!(matches!(
            TicketEvent::decode(&serialized),
            Err(EventError::UnknownEventType(t)) if t == "SeatsReserved.v1"
        ));
    }

    #[test]
    fn decode_rejects_mislabelled_payload() {
        let mut serialized = SerializedEvent::from_event(&issued()).unwrap();
        serialized.event_type = TicketEvent::REVOKED.to_string();
        assert!(matches!(
            TicketEvent::decode(&serialized),
            Err(EventError::DeserializationError(_))
        ));
    }

    #[test]
    fn action_conversion_keeps_fields() {
        let action = issued().into_action();
        assert!(action.is_event());
        assert_eq!(TicketEvent::from_action(&action), Some(issued()));
    }

    #[tokio::test]
    async fn broadcast_bus_delivers_to_subscribers() {
        let bus = BroadcastEventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let serialized = SerializedEvent::from_event(&issued()).unwrap();
        bus.publish("ticket-events", &serialized).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "ticket-events");
        assert_eq!(received.event, serialized);
    }

    #[test]
    fn broadcast_bus_without_subscribers_is_fine() {
        let bus = BroadcastEventBus::new(1);
        let serialized = SerializedEvent::new(TicketEvent::ISSUED.to_string(), vec![]);
        assert!(bus.publish("ticket-events", &serialized).is_ok());
        assert!(bus.publish("", &serialized).is_err());
    }
}
