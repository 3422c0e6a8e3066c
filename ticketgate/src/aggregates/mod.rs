//! Aggregate reducers for the ticket registry.
//!
//! - Ticket: issuance, validation, and revocation of tickets

pub mod ticket;

pub use ticket::{TicketAction, TicketEnvironment, TicketReducer};
