//! Configuration management for the ticket registry.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Binaries call `dotenvy::dotenv()` first so a local `.env` file is honoured.

use crate::types::Identity;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Default notification topic
pub const DEFAULT_EVENT_TOPIC: &str = "ticket-events";
/// Default per-subscriber buffer of the broadcast event bus and registry subscribers
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;
/// Default `tracing` filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set to something unusable
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Value found
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Registry configuration
    pub registry: RegistryConfig,
    /// Notification configuration
    pub notifications: NotificationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Identity allowed to issue and revoke (`TICKETGATE_ORGANIZER`)
    pub organizer: Identity,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Topic events are published on (`TICKETGATE_EVENT_TOPIC`)
    pub topic: String,
    /// Buffer per subscriber, for both the broadcast bus and
    /// `TicketRegistry::subscribe` (`TICKETGATE_BROADCAST_CAPACITY`)
    pub broadcast_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive (`RUST_LOG`)
    pub level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `TICKETGATE_ORGANIZER` is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let organizer = lookup("TICKETGATE_ORGANIZER")
            .map(Identity::new)
            .filter(|organizer| !organizer.is_blank())
            .ok_or(ConfigError::Missing("TICKETGATE_ORGANIZER"))?;

        let topic = lookup("TICKETGATE_EVENT_TOPIC").unwrap_or_else(|| DEFAULT_EVENT_TOPIC.to_string());
        if topic.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "TICKETGATE_EVENT_TOPIC",
                value: topic,
                reason: "topic must not be empty".to_string(),
            });
        }

        let broadcast_capacity = match lookup("TICKETGATE_BROADCAST_CAPACITY") {
            None => DEFAULT_BROADCAST_CAPACITY,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: "TICKETGATE_BROADCAST_CAPACITY",
                        value: raw,
                        reason: "must be greater than zero".to_string(),
                    });
                },
                Ok(capacity) => capacity,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "TICKETGATE_BROADCAST_CAPACITY",
                        value: raw,
                        reason: e.to_string(),
                    });
                },
            },
        };

        let level = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            registry: RegistryConfig { organizer },
            notifications: NotificationConfig {
                topic,
                broadcast_capacity,
            },
            logging: LoggingConfig { level },
        })
    }
}
