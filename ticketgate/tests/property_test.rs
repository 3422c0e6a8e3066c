//! Property-based tests for the ticket reducer.
//!
//! Random command sequences are run against both the reducer and a small
//! reference model; every outcome and the final state must agree.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use proptest::prelude::*;
use std::sync::Arc;
use ticketgate::{
    EventId, Identity, RegistryError, RegistryState, SecretHash, TicketAction, TicketEnvironment,
    TicketId, TicketReducer, TicketStatus,
};
use ticketgate_core::reducer::Reducer;
use ticketgate_testing::mocks::{InMemoryEventBus, test_clock};

const ORGANIZER: &str = "org";

#[derive(Clone, Debug)]
enum Command {
    Issue {
        by_organizer: bool,
        owner: String,
        hash: String,
    },
    Validate {
        id: u64,
        hash: String,
    },
    Revoke {
        by_organizer: bool,
        id: u64,
    },
}

fn hash_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(String::new()),
        6 => "h[0-3]".prop_map(String::from),
    ]
}

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        (
            prop::bool::weighted(0.8),
            prop_oneof![1 => Just(" ".to_string()), 5 => "[a-c]{1,3}".prop_map(String::from)],
            hash_strategy(),
        )
            .prop_map(|(by_organizer, owner, hash)| Command::Issue {
                by_organizer,
                owner,
                hash,
            }),
        (0u64..12, hash_strategy()).prop_map(|(id, hash)| Command::Validate { id, hash }),
        (prop::bool::weighted(0.8), 0u64..12)
            .prop_map(|(by_organizer, id)| Command::Revoke { by_organizer, id }),
    ]
}

/// Reference model: index `i` holds ticket `i + 1`
#[derive(Default)]
struct Model {
    tickets: Vec<(String, String, TicketStatus)>,
}

impl Model {
    fn apply(&mut self, command: &Command) -> Result<(), RegistryError> {
        match command {
            Command::Issue {
                by_organizer,
                owner,
                hash,
            } => {
                if !by_organizer {
                    return Err(RegistryError::Unauthorized {
                        caller: caller(false),
                    });
                }
                if owner.trim().is_empty() {
                    return Err(RegistryError::InvalidArgument {
                        field: "owner",
                        reason: "must not be empty",
                    });
                }
                if hash.is_empty() {
                    return Err(RegistryError::InvalidArgument {
                        field: "secret_hash",
                        reason: "must not be empty",
                    });
                }
                self.tickets
                    .push((owner.clone(), hash.clone(), TicketStatus::Valid));
                Ok(())
            },
            Command::Validate { id, hash } => {
                let ticket = self.lookup(*id)?;
                if ticket.2 != TicketStatus::Valid {
                    return Err(RegistryError::AlreadyFinalized(TicketId::new(*id)));
                }
                if ticket.1 != *hash {
                    return Err(RegistryError::HashMismatch(TicketId::new(*id)));
                }
                ticket.2 = TicketStatus::Used;
                Ok(())
            },
            Command::Revoke { by_organizer, id } => {
                if !by_organizer {
                    return Err(RegistryError::Unauthorized {
                        caller: caller(false),
                    });
                }
                let ticket = self.lookup(*id)?;
                if ticket.2 != TicketStatus::Valid {
                    return Err(RegistryError::AlreadyFinalized(TicketId::new(*id)));
                }
                ticket.2 = TicketStatus::Revoked;
                Ok(())
            },
        }
    }

    fn lookup(&mut self, id: u64) -> Result<&mut (String, String, TicketStatus), RegistryError> {
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.tickets.get_mut(index))
            .ok_or(RegistryError::NotFound(TicketId::new(id)))
    }
}

fn caller(by_organizer: bool) -> Identity {
    if by_organizer {
        Identity::new(ORGANIZER)
    } else {
        Identity::new("stranger")
    }
}

fn to_action(command: &Command) -> TicketAction {
    match command.clone() {
        Command::Issue {
            by_organizer,
            owner,
            hash,
        } => TicketAction::IssueTicket {
            caller: caller(by_organizer),
            owner: Identity::new(owner),
            secret_hash: SecretHash::new(hash),
            event_id: EventId::new(1),
        },
        Command::Validate { id, hash } => TicketAction::ValidateTicket {
            caller: Identity::new("gate"),
            ticket_id: TicketId::new(id),
            candidate: SecretHash::new(hash),
        },
        Command::Revoke { by_organizer, id } => TicketAction::RevokeTicket {
            caller: caller(by_organizer),
            ticket_id: TicketId::new(id),
        },
    }
}

fn env() -> TicketEnvironment {
    TicketEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(InMemoryEventBus::new()),
        "ticket-events",
    )
}

proptest! {
    #[test]
    fn reducer_matches_model(commands in prop::collection::vec(command_strategy(), 0..60)) {
        let reducer = TicketReducer::new();
        let env = env();
        let mut state = RegistryState::new(Identity::new(ORGANIZER));
        let mut model = Model::default();

        for command in &commands {
            let before = state.clone();
            let actual = reducer
                .reduce(&mut state, to_action(command), &env)
                .map(|_| ());
            let expected = model.apply(command);

            prop_assert_eq!(&actual, &expected, "command {:?}", command);
            if actual.is_err() {
                prop_assert_eq!(&state, &before);
            }
        }

        prop_assert_eq!(state.len(), model.tickets.len());
        prop_assert_eq!(state.next_id().value(), model.tickets.len() as u64 + 1);
        for (index, (owner, hash, status)) in model.tickets.iter().enumerate() {
            let ticket = state.get(TicketId::new(index as u64 + 1)).unwrap();
            prop_assert_eq!(ticket.owner().as_str(), owner.as_str());
            prop_assert_eq!(ticket.secret_hash().expose(), hash.as_str());
            prop_assert_eq!(ticket.status(), *status);
        }
    }

    #[test]
    fn wrong_hash_never_mutates(secret in "[a-z]{1,8}", candidate in "[a-z]{1,8}") {
        prop_assume!(secret != candidate);

        let reducer = TicketReducer::new();
        let env = env();
        let mut state = RegistryState::new(Identity::new(ORGANIZER));
        reducer
            .reduce(
                &mut state,
                TicketAction::IssueTicket {
                    caller: Identity::new(ORGANIZER),
                    owner: Identity::new("alice"),
                    secret_hash: SecretHash::new(secret),
                    event_id: EventId::new(1),
                },
                &env,
            )
            .unwrap();
        let before = state.clone();

        let result = reducer.reduce(
            &mut state,
            TicketAction::ValidateTicket {
                caller: Identity::new("gate"),
                ticket_id: TicketId::FIRST,
                candidate: SecretHash::new(candidate),
            },
            &env,
        );

        prop_assert_eq!(result.map(|_| ()), Err(RegistryError::HashMismatch(TicketId::FIRST)));
        prop_assert_eq!(state, before);
    }
}
