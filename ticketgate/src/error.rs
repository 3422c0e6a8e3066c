//! Error types for registry operations.
//!
//! Every rejection is an expected, typed outcome. A rejected command never leaves
//! a partial change behind, so callers may retry with corrected input.

use crate::types::{Identity, TicketId};
use thiserror::Error;

/// Why a registry command or query was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Caller lacks the organizer role
    #[error("caller '{caller}' is not the organizer")]
    Unauthorized {
        /// The rejected caller
        caller: Identity,
    },

    /// Malformed input
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// Offending argument
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },

    /// No ticket with this identifier
    #[error("ticket {0} not found")]
    NotFound(TicketId),

    /// Presented secret differs from the stored one
    #[error("secret hash does not match ticket {0}")]
    HashMismatch(TicketId),

    /// Ticket was already used or revoked
    #[error("ticket {0} is not currently valid")]
    AlreadyFinalized(TicketId),

    /// A command was committed but its outcome event was not emitted
    #[error("{command} committed without emitting its outcome event")]
    MissingOutcome {
        /// Command name
        command: &'static str,
    },
}

impl RegistryError {
    /// Fieldless classification, for transports and metric labels
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::HashMismatch(_) => ErrorKind::HashMismatch,
            Self::AlreadyFinalized(_) => ErrorKind::AlreadyFinalized,
            Self::MissingOutcome { .. } => ErrorKind::Internal,
        }
    }
}

/// Classification of [`RegistryError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`RegistryError::Unauthorized`]
    Unauthorized,
    /// See [`RegistryError::InvalidArgument`]
    InvalidArgument,
    /// See [`RegistryError::NotFound`]
    NotFound,
    /// See [`RegistryError::HashMismatch`]
    HashMismatch,
    /// See [`RegistryError::AlreadyFinalized`]
    AlreadyFinalized,
    /// See [`RegistryError::MissingOutcome`]
    Internal,
}

impl ErrorKind {
    /// Stable snake-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::HashMismatch => "hash_mismatch",
            Self::AlreadyFinalized => "already_finalized",
            Self::Internal => "internal",
        }
    }
}
