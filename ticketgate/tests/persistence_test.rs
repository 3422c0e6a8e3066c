//! Snapshot and replay tests.
//!
//! A registry rebuilt from its snapshot or from its published notifications must
//! match the registry it was taken from, and keep issuing where that one left off.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use std::sync::Arc;
use ticketgate::{
    EventId, PersistenceError, RegistrySnapshot, RegistryState, TicketEnvironment, TicketEvent,
    TicketId, TicketRegistry, TicketStatus,
};
use ticketgate_core::event::{EventError, SerializedEvent};
use ticketgate_testing::mocks::{InMemoryEventBus, test_clock};

const ORGANIZER: &str = "org";
const TOPIC: &str = "ticket-events";

fn env(bus: Arc<InMemoryEventBus>) -> TicketEnvironment {
    TicketEnvironment::new(Arc::new(test_clock()), bus, TOPIC)
}

/// Registry with one used, one revoked and one valid ticket
async fn populated() -> (TicketRegistry, Arc<InMemoryEventBus>) {
    let bus = Arc::new(InMemoryEventBus::new());
    let registry = TicketRegistry::new(ORGANIZER, env(bus.clone())).unwrap();

    for (owner, hash) in [("alice", "h1"), ("bob", "h2"), ("carol", "h3")] {
        registry
            .issue(ORGANIZER, owner, hash, EventId::new(42))
            .await
            .unwrap();
    }
    registry.validate("gate", TicketId::new(1), "h1").await.unwrap();
    registry.revoke(ORGANIZER, TicketId::new(2)).await.unwrap();

    (registry, bus)
}

#[tokio::test]
async fn test_snapshot_round_trip_through_bytes_and_json() {
    let (registry, _bus) = populated().await;
    let snapshot = registry.snapshot().await;

    let from_bytes = RegistrySnapshot::from_bytes(&snapshot.to_bytes().unwrap()).unwrap();
    let from_json = RegistrySnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(from_bytes, snapshot);
    assert_eq!(from_json, snapshot);

    let restored =
        TicketRegistry::from_snapshot(from_json, env(Arc::new(InMemoryEventBus::new()))).unwrap();
    assert_eq!(restored.snapshot().await, snapshot);
    assert_eq!(restored.status_counts().await, registry.status_counts().await);
}

#[tokio::test]
async fn test_restored_registry_continues_numbering() {
    let (registry, _bus) = populated().await;
    let restored = TicketRegistry::from_snapshot(
        registry.snapshot().await,
        env(Arc::new(InMemoryEventBus::new())),
    )
    .unwrap();

    let id = restored
        .issue(ORGANIZER, "dave", "h4", EventId::new(42))
        .await
        .unwrap();
    assert_eq!(id, TicketId::new(4));

    // Terminal tickets stay terminal after a restore
    let rescan = restored.validate("gate", TicketId::new(1), "h1").await;
    assert!(rescan.is_err());
}

#[tokio::test]
async fn test_replay_of_published_log_rebuilds_state() {
    let (registry, bus) = populated().await;

    let events: Vec<TicketEvent> = bus
        .events_on(TOPIC)
        .iter()
        .map(|serialized| TicketEvent::decode(serialized).unwrap())
        .collect();
    assert_eq!(events.len(), 5);

    let replay_bus = Arc::new(InMemoryEventBus::new());
    let rebuilt = TicketRegistry::from_events(ORGANIZER, events, env(replay_bus.clone())).unwrap();

    assert_eq!(rebuilt.snapshot().await, registry.snapshot().await);
    assert!(replay_bus.is_empty(), "replay must not republish");
    assert_eq!(
        rebuilt.get_ticket(TicketId::new(2)).await.unwrap().status(),
        TicketStatus::Revoked
    );
}

#[tokio::test]
async fn test_replay_serialized_rejects_foreign_events() {
    let (_registry, bus) = populated().await;
    let mut log = bus.events_on(TOPIC);
    log.push(SerializedEvent::new("SeatsReserved.v1".to_string(), vec![1, 2, 3]));

    let result = RegistryState::replay_serialized(ORGANIZER.into(), &log);
    assert_eq!(
        result,
        Err(PersistenceError::Event(EventError::UnknownEventType(
            "SeatsReserved.v1".to_string()
        )))
    );
}

#[tokio::test]
async fn test_tampered_snapshot_is_rejected() {
    let (registry, _bus) = populated().await;

    let mut gap = registry.snapshot().await;
    gap.tickets.remove(1);
    assert!(matches!(
        TicketRegistry::from_snapshot(gap, env(Arc::new(InMemoryEventBus::new()))),
        Err(PersistenceError::NonDenseIds { .. })
    ));

    let mut stale_counter = registry.snapshot().await;
    stale_counter.next_id = TicketId::new(3);
    assert!(matches!(
        TicketRegistry::from_snapshot(stale_counter, env(Arc::new(InMemoryEventBus::new()))),
        Err(PersistenceError::NextIdMismatch { .. })
    ));

    assert!(matches!(
        RegistrySnapshot::from_bytes(b"not a snapshot"),
        Err(PersistenceError::Codec(_))
    ));
}
