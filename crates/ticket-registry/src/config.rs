use chrono::Duration;
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default login ticket lifetime in milliseconds.
pub const DEFAULT_LOGIN_TICKET_TTL_MS: u64 = 5_000;

/// Default ticket-granting ticket lifetime in milliseconds.
pub const DEFAULT_TICKET_GRANTING_TICKET_TTL_MS: u64 = 15_000;

/// Default service ticket lifetime in milliseconds.
pub const DEFAULT_SERVICE_TICKET_TTL_MS: u64 = 5_000;

/// Longest accepted ticket lifetime in milliseconds (one year).
pub const MAX_TICKET_TTL_MS: u64 = 365 * 24 * 60 * 60 * 1000;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Ticket lifetimes, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketTtls {
    pub login_ticket_ms: u64,
    pub ticket_granting_ticket_ms: u64,
    pub service_ticket_ms: u64,
}

impl Default for TicketTtls {
    fn default() -> Self {
        Self {
            login_ticket_ms: DEFAULT_LOGIN_TICKET_TTL_MS,
            ticket_granting_ticket_ms: DEFAULT_TICKET_GRANTING_TICKET_TTL_MS,
            service_ticket_ms: DEFAULT_SERVICE_TICKET_TTL_MS,
        }
    }
}

impl TicketTtls {
    pub fn login_ticket(&self) -> Duration {
        millis(self.login_ticket_ms)
    }

    pub fn ticket_granting_ticket(&self) -> Duration {
        millis(self.ticket_granting_ticket_ms)
    }

    pub fn service_ticket(&self) -> Duration {
        millis(self.service_ticket_ms)
    }
}

// Clamped so `now + ttl` stays inside chrono's range for hand-built TicketTtls.
fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms.min(MAX_TICKET_TTL_MS)).unwrap_or(i64::MAX))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub ttls: TicketTtls,
    pub run_migrations: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let max_connections = parse_positive(vars, "DB_MAX_CONNECTIONS")?
            .map(u32::try_from)
            .transpose()
            .map_err(|_| ConfigError::InvalidValue {
                name: "DB_MAX_CONNECTIONS".to_string(),
                reason: "out of range".to_string(),
            })?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let ttls = TicketTtls {
            login_ticket_ms: parse_ttl(vars, "LOGIN_TICKET_TTL_MS")?
                .unwrap_or(DEFAULT_LOGIN_TICKET_TTL_MS),
            ticket_granting_ticket_ms: parse_ttl(vars, "TICKET_GRANTING_TICKET_TTL_MS")?
                .unwrap_or(DEFAULT_TICKET_GRANTING_TICKET_TTL_MS),
            service_ticket_ms: parse_ttl(vars, "SERVICE_TICKET_TTL_MS")?
                .unwrap_or(DEFAULT_SERVICE_TICKET_TTL_MS),
        };

        let run_migrations = match vars.get("RUN_MIGRATIONS").map(|v| v.as_str()) {
            None => false,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "RUN_MIGRATIONS".to_string(),
                    reason: format!("expected true/false, got '{}'", other),
                })
            }
        };

        Ok(Config {
            database_url,
            max_connections,
            ttls,
            run_migrations,
        })
    }
}

/// Parse an optional ticket lifetime, capped at `MAX_TICKET_TTL_MS`.
fn parse_ttl(vars: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ConfigError> {
    let value = parse_positive(vars, name)?;

    if let Some(ms) = value {
        if ms > MAX_TICKET_TTL_MS {
            return Err(ConfigError::InvalidValue {
                name: name.to_string(),
                reason: format!("must be at most {} ms, got {}", MAX_TICKET_TTL_MS, ms),
            });
        }
    }

    Ok(value)
}

/// Parse an optional strictly positive integer variable.
fn parse_positive(vars: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(None);
    };

    let value: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("{}", e),
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(Some(value))
}
