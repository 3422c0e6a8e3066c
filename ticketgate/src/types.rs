//! Domain types for the ticket registry.
//!
//! Value objects (identifiers, identities, secret hashes), the [`Ticket`] entity and
//! the [`RegistryState`] owned by the store. Mutation is crate-private: outside the
//! reducer, tickets and state are read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Sequential ticket identifier, starting at 1
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(u64);

impl TicketId {
    /// The identifier of the first ticket a registry issues
    pub const FIRST: Self = Self(1);

    /// Wrap a raw identifier
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw identifier
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The identifier that follows this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External reference to the event a ticket grants access to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw event reference
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw event reference
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Identities and secrets
// ============================================================================

/// An authenticated caller or ticket holder
///
/// Authentication happens in the transport; the registry only compares
/// identities for equality.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an identity string
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identity as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty or whitespace-only identities never name a holder
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque verification string bound to a ticket (the QR hash)
///
/// Compared by content. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretHash(String);

impl SecretHash {
    /// Wrap a hash or encoded secret
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact content comparison against a presented candidate
    #[must_use]
    pub fn matches(&self, candidate: &Self) -> bool {
        self.0 == candidate.0
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHash(<redacted>)")
    }
}

impl From<&str> for SecretHash {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// Lifecycle status of a ticket
///
/// ```text
/// Valid ──validate──▶ Used
///   │
///   └────revoke─────▶ Revoked
/// ```
///
/// `Used` and `Revoked` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Issued and not yet consumed
    Valid,
    /// Successfully validated once
    Used,
    /// Cancelled by the organizer
    Revoked,
}

impl TicketStatus {
    /// Whether the ticket can still be validated or revoked
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Whether the ticket has reached a terminal state
    #[must_use]
    pub const fn is_final(self) -> bool {
        !self.is_valid()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Used => write!(f, "used"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

/// A one-time access ticket
///
/// Everything but `status` is fixed at issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    owner: Identity,
    secret_hash: SecretHash,
    event_id: EventId,
    status: TicketStatus,
    issued_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a freshly issued, valid ticket
    #[must_use]
    pub const fn issue(
        id: TicketId,
        owner: Identity,
        secret_hash: SecretHash,
        event_id: EventId,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            secret_hash,
            event_id,
            status: TicketStatus::Valid,
            issued_at,
        }
    }

    /// Ticket identifier
    #[must_use]
    pub const fn id(&self) -> TicketId {
        self.id
    }

    /// Holder identity
    #[must_use]
    pub const fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Verification secret
    #[must_use]
    pub const fn secret_hash(&self) -> &SecretHash {
        &self.secret_hash
    }

    /// Event the ticket grants access to
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Current lifecycle status
    #[must_use]
    pub const fn status(&self) -> TicketStatus {
        self.status
    }

    /// Issuance timestamp
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub(crate) const fn set_status(&mut self, status: TicketStatus) {
        self.status = status;
    }
}

// ============================================================================
// Registry state
// ============================================================================

/// Per-status ticket totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Tickets still valid
    pub valid: usize,
    /// Tickets validated
    pub used: usize,
    /// Tickets revoked
    pub revoked: usize,
}

/// State owned by the registry store
///
/// Tickets are kept in an ordered map so iteration, snapshots and replays are
/// deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryState {
    organizer: Identity,
    next_id: TicketId,
    tickets: BTreeMap<TicketId, Ticket>,
}

impl RegistryState {
    /// Empty registry controlled by `organizer`
    #[must_use]
    pub const fn new(organizer: Identity) -> Self {
        Self {
            organizer,
            next_id: TicketId::FIRST,
            tickets: BTreeMap::new(),
        }
    }

    pub(crate) const fn from_parts(
        organizer: Identity,
        next_id: TicketId,
        tickets: BTreeMap<TicketId, Ticket>,
    ) -> Self {
        Self {
            organizer,
            next_id,
            tickets,
        }
    }

    /// The only identity allowed to issue and revoke
    #[must_use]
    pub const fn organizer(&self) -> &Identity {
        &self.organizer
    }

    /// Whether `caller` is the organizer
    #[must_use]
    pub fn is_organizer(&self, caller: &Identity) -> bool {
        self.organizer == *caller
    }

    /// The identifier the next successful issuance will receive
    #[must_use]
    pub const fn next_id(&self) -> TicketId {
        self.next_id
    }

    /// Look up a ticket
    #[must_use]
    pub fn get(&self, ticket_id: TicketId) -> Option<&Ticket> {
        self.tickets.get(&ticket_id)
    }

    pub(crate) fn get_mut(&mut self, ticket_id: TicketId) -> Option<&mut Ticket> {
        self.tickets.get_mut(&ticket_id)
    }

    /// All tickets ordered by identifier
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    /// Number of tickets ever issued
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Whether no ticket has been issued yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Tickets for one event, ordered by identifier
    #[must_use]
    pub fn tickets_for_event(&self, event_id: EventId) -> Vec<Ticket> {
        self.tickets
            .values()
            .filter(|ticket| ticket.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Tickets held by one owner, ordered by identifier
    #[must_use]
    pub fn tickets_owned_by(&self, owner: &Identity) -> Vec<Ticket> {
        self.tickets
            .values()
            .filter(|ticket| ticket.owner == *owner)
            .cloned()
            .collect()
    }

    /// Totals per status
    #[must_use]
    pub fn status_counts(&self) -> StatusCounts {
        self.tickets
            .values()
            .fold(StatusCounts::default(), |mut counts, ticket| {
                match ticket.status {
                    TicketStatus::Valid => counts.valid += 1,
                    TicketStatus::Used => counts.used += 1,
                    TicketStatus::Revoked => counts.revoked += 1,
                }
                counts
            })
    }

    /// Record a newly issued ticket and advance the counter past it
    ///
    /// Tickets are write-once: returns `false` and changes nothing if the
    /// identifier is already taken.
    #[must_use]
    pub(crate) fn insert_issued(&mut self, ticket: Ticket) -> bool {
        let id = ticket.id;
        if self.tickets.contains_key(&id) {
            return false;
        }
        self.tickets.insert(id, ticket);
        if id >= self.next_id {
            self.next_id = id.next();
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ticket(id: u64, owner: &str, event: u64) -> Ticket {
        Ticket::issue(
            TicketId::new(id),
            Identity::new(owner),
            SecretHash::new(format!("h{id}")),
            EventId::new(event),
            Utc::now(),
        )
    }

    #[test]
    fn secret_hash_debug_is_redacted() {
        let hash = SecretHash::new("super-secret");
        let rendered = format!("{hash:?}");
        assert!(!rendered.contains("super-secret"));
        assert_eq!(hash.expose(), "super-secret");
    }

    #[test]
    fn secret_hash_matches_by_content() {
        let stored = SecretHash::new(String::from("h1"));
        assert!(stored.matches(&SecretHash::from("h1")));
        assert!(!stored.matches(&SecretHash::from("h1 ")));
        assert!(!stored.matches(&SecretHash::from("H1")));
    }

    #[test]
    fn blank_identities() {
        assert!(Identity::new("").is_blank());
        assert!(Identity::new("  \t").is_blank());
        assert!(!Identity::new("alice").is_blank());
    }

    #[test]
    fn status_terminality() {
        assert!(TicketStatus::Valid.is_valid());
        assert!(TicketStatus::Used.is_final());
        assert!(TicketStatus::Revoked.is_final());
        assert_eq!(TicketStatus::Revoked.to_string(), "revoked");
    }

    #[test]
    fn insert_issued_advances_counter() {
        let mut state = RegistryState::new(Identity::new("org"));
        assert_eq!(state.next_id(), TicketId::FIRST);

        assert!(state.insert_issued(ticket(1, "alice", 7)));
        assert!(state.insert_issued(ticket(2, "bob", 8)));

        assert_eq!(state.next_id(), TicketId::new(3));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn insert_issued_refuses_taken_id() {
        let mut state = RegistryState::new(Identity::new("org"));
        assert!(state.insert_issued(ticket(1, "alice", 7)));
        if let Some(t) = state.get_mut(TicketId::new(1)) {
            t.set_status(TicketStatus::Used);
        }

        assert!(!state.insert_issued(ticket(1, "mallory", 9)));

        let kept = state.get(TicketId::new(1)).unwrap();
        assert_eq!(kept.owner(), &Identity::new("alice"));
        assert_eq!(kept.event_id(), EventId::new(7));
        assert_eq!(kept.status(), TicketStatus::Used);
        assert_eq!(state.next_id(), TicketId::new(2));
    }

    #[test]
    fn queries_filter_and_order() {
        let mut state = RegistryState::new(Identity::new("org"));
        for (id, owner, event) in [(1, "alice", 7), (2, "bob", 7), (3, "alice", 9)] {
            assert!(state.insert_issued(ticket(id, owner, event)));
        }
        if let Some(t) = state.get_mut(TicketId::new(2)) {
            t.set_status(TicketStatus::Used);
        }

        let for_event: Vec<u64> = state
            .tickets_for_event(EventId::new(7))
            .iter()
            .map(|t| t.id().value())
            .collect();
        assert_eq!(for_event, vec![1, 2]);

        let alice: Vec<u64> = state
            .tickets_owned_by(&Identity::new("alice"))
            .iter()
            .map(|t| t.id().value())
            .collect();
        assert_eq!(alice, vec![1, 3]);

        assert_eq!(
            state.status_counts(),
            StatusCounts {
                valid: 2,
                used: 1,
                revoked: 0
            }
        );
    }
}
