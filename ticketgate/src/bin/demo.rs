//! Ticket Registry Demo
//!
//! Walks through the ticket lifecycle against an in-process registry:
//! - Issuing tickets (and an unauthorized attempt)
//! - Admission at the gate, then a second scan of the same ticket
//! - Revocation of an unused ticket
//! - The audit trail seen by an event bus subscriber
//! - The snapshot an external store would persist
//!
//! # Usage
//!
//! ```bash
//! TICKETGATE_ORGANIZER=acme-events cargo run --bin demo
//! ```

use std::sync::Arc;
use ticketgate::{
    BroadcastEventBus, Config, EventId, TicketEnvironment, TicketEvent, TicketId, TicketRegistry,
    metrics::register_registry_metrics,
};
use ticketgate_core::environment::SystemClock;
use ticketgate_core::event::Event;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    register_registry_metrics();

    println!("\n🎫 ============================================");
    println!("   Ticket Registry - Live Demo");
    println!("============================================\n");

    let organizer = config.registry.organizer.clone();
    let bus = Arc::new(BroadcastEventBus::new(config.notifications.broadcast_capacity));
    let mut audit = bus.subscribe();

    let env = TicketEnvironment::new(
        Arc::new(SystemClock),
        bus.clone(),
        config.notifications.topic.clone(),
    )
    .with_subscriber_capacity(config.notifications.broadcast_capacity);
    let registry = TicketRegistry::new(organizer.clone(), env)?;
    println!("⚙️  Registry ready (organizer: {organizer})\n");

    let festival = EventId::new(42);

    // ========== Scenario 1: issue, admit, rescan ==========

    println!("1️⃣  Issuing a ticket to alice...");
    let first = registry
        .issue(organizer.clone(), "alice", "h1", festival)
        .await?;
    println!("   ✓ Ticket {first} is {}", registry.get_ticket(first).await?.status());

    println!("   Scanning ticket {first} at gate-3...");
    let admitted = registry.validate("gate-3", first, "h1").await?;
    println!("   ✓ Admitted: {admitted}, now {}", registry.get_ticket(first).await?.status());

    println!("   Scanning ticket {first} again...");
    match registry.validate("gate-3", first, "h1").await {
        Ok(_) => println!("   ✗ Ticket admitted twice!"),
        Err(error) => println!("   ✓ Rejected: {error}"),
    }

    // ========== Scenario 2: revoke ==========

    println!("\n2️⃣  Issuing a ticket to bob and revoking it...");
    let second = registry
        .issue(organizer.clone(), "bob", "h2", festival)
        .await?;
    registry.revoke(organizer.clone(), second).await?;
    println!("   ✓ Ticket {second} is {}", registry.get_ticket(second).await?.status());

    for attempt in [
        registry.validate("gate-1", second, "h2").await.map(|_| ()),
        registry.revoke(organizer.clone(), second).await,
    ] {
        if let Err(error) = attempt {
            println!("   ✓ Rejected: {error}");
        }
    }

    // ========== Scenario 3: rejections ==========

    println!("\n3️⃣  Rejected requests...");
    if let Err(error) = registry.issue("mallory", "mallory", "h3", festival).await {
        println!("   ✓ {error}");
    }
    if let Err(error) = registry.get_ticket(TicketId::new(999)).await {
        println!("   ✓ {error}");
    }
    println!("   Next ticket id is still {}", registry.next_ticket_id().await);

    // ========== Audit trail ==========

    println!("\n📜 Audit trail received by the bus subscriber:");
    while let Ok(published) = audit.try_recv() {
        let event = TicketEvent::decode(&published.event)?;
        println!(
            "   [{}] {} ticket={} actor={}",
            published.topic,
            event.event_type(),
            event.ticket_id(),
            event.actor()
        );
    }

    let counts = registry.status_counts().await;
    println!(
        "\n📊 valid={} used={} revoked={}",
        counts.valid, counts.used, counts.revoked
    );

    println!("\n💾 Snapshot:");
    println!("{}", registry.snapshot().await.to_json()?);

    Ok(())
}
