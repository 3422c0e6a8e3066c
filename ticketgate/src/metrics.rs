//! Registry metrics.
//!
//! Recorded through the `metrics` facade. The library installs no recorder or
//! exporter; the embedding process decides where they go.

use crate::error::RegistryError;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Tickets issued
pub const TICKETS_ISSUED: &str = "ticketgate_tickets_issued_total";
/// Tickets validated
pub const TICKETS_VALIDATED: &str = "ticketgate_tickets_validated_total";
/// Tickets revoked
pub const TICKETS_REVOKED: &str = "ticketgate_tickets_revoked_total";
/// Rejected commands, labelled by `command` and `kind`
pub const COMMANDS_REJECTED: &str = "ticketgate_commands_rejected_total";
/// Time spent in a command, labelled by `command`
pub const COMMAND_DURATION: &str = "ticketgate_command_duration_seconds";

/// Register all metric descriptions.
pub fn register_registry_metrics() {
    describe_counter!(TICKETS_ISSUED, "Total number of tickets issued");
    describe_counter!(
        TICKETS_VALIDATED,
        "Total number of tickets successfully validated"
    );
    describe_counter!(TICKETS_REVOKED, "Total number of tickets revoked");
    describe_counter!(
        COMMANDS_REJECTED,
        "Total number of registry commands rejected, by error kind"
    );
    describe_histogram!(
        COMMAND_DURATION,
        "Time taken to process a registry command, including lock wait"
    );
}

/// Registry command, as a metric label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Issue,
    Validate,
    Revoke,
}

impl Command {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Validate => "validate",
            Self::Revoke => "revoke",
        }
    }

    const fn committed_counter(self) -> &'static str {
        match self {
            Self::Issue => TICKETS_ISSUED,
            Self::Validate => TICKETS_VALIDATED,
            Self::Revoke => TICKETS_REVOKED,
        }
    }
}

pub(crate) fn record_committed(command: Command, elapsed: Duration) {
    counter!(command.committed_counter()).increment(1);
    histogram!(COMMAND_DURATION, "command" => command.as_str()).record(elapsed.as_secs_f64());
}

pub(crate) fn record_rejected(command: Command, error: &RegistryError, elapsed: Duration) {
    counter!(
        COMMANDS_REJECTED,
        "command" => command.as_str(),
        "kind" => error.kind().as_str()
    )
    .increment(1);
    histogram!(COMMAND_DURATION, "command" => command.as_str()).record(elapsed.as_secs_f64());
}
