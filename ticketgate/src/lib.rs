//! Ticketgate - a registry of one-time access tickets
//!
//! Tickets are issued by a single organizer, bound to an owner and a secret
//! verification string (the QR hash), and can be validated at the gate at most
//! once. The organizer may revoke a ticket that has not been used.
//!
//! # Architecture
//!
//! ```text
//!   issue / validate / revoke            get_ticket / status_counts / ...
//!              │                                     │
//!              ▼                                     ▼
//!   ┌──────────────────────┐  write lock   ┌──────────────────┐  read lock
//!   │    TicketRegistry    │──────────────▶│      Store       │◀────────────
//!   └──────────────────────┘               │  RegistryState   │
//!                                          └──────────────────┘
//!                                                   │ TicketReducer
//!                                                   ▼
//!                                    Emit(TicketIssued | Validated | Revoked)
//!                                    Publish(TicketEvent) ──▶ EventBus
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Valid ──validate──▶ Used
//!   │
//!   └────revoke─────▶ Revoked
//! ```
//!
//! The status check and the status change of a command run in one critical
//! section, so two gates presenting the same ticket at the same moment can never
//! both be admitted:
//!
//! ```text
//! if ticket.status != Valid {
//!     return AlreadyFinalized // The loser of a race lands here
//! }
//! ```
//!
//! # Usage
//!
//! See [`TicketRegistry`] for the operations and [`aggregates`] for the reducer and
//! its tests.

#![forbid(unsafe_code)]

pub mod aggregates;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifications;
pub mod persistence;
pub mod registry;
pub mod types;

pub use aggregates::{TicketAction, TicketEnvironment, TicketReducer};
pub use config::{Config, ConfigError};
pub use error::{ErrorKind, RegistryError};
pub use notifications::{BroadcastEventBus, PublishedEvent, TicketEvent};
pub use persistence::{PersistenceError, RegistrySnapshot};
pub use registry::TicketRegistry;
pub use types::{
    EventId, Identity, RegistryState, SecretHash, StatusCounts, Ticket, TicketId, TicketStatus,
};
