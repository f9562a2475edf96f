//! CAS Ticket Registry Library
//!
//! Ticket lifecycle management for CAS single sign-on: issuing, looking up,
//! linking and invalidating login tickets, ticket-granting tickets and
//! service tickets stored in PostgreSQL.
//!
//! # Modules
//!
//! - `config` - Registry configuration
//! - `crypto` - Ticket identifier generation
//! - `errors` - Error types
//! - `models` - Ticket rows and kinds
//! - `observability` - Log correlation and metrics
//! - `repositories` - Database access layer
//! - `services` - The ticket registry
//! - `store` - Storage trait and PostgreSQL implementation

pub mod config;
pub mod crypto;
pub mod errors;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
pub mod store;

pub use config::{Config, ConfigError, TicketTtls};
pub use errors::RegistryError;
pub use models::{
    LoginTicket, ServiceLogin, ServiceLoginOutcome, ServiceTicket, Ticket, TicketGrantingTicket,
    TicketKind,
};
pub use services::registry::TicketRegistry;
pub use store::{PgTicketStore, TicketStore};

/// Schema migrations for the ticket tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
