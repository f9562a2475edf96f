use crate::models::TicketKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// No row matched a lookup expected to be unique.
    #[error("No {kind} found")]
    NotFound { kind: TicketKind, tid: String },

    /// More than one row matched a lookup expected to be unique.
    #[error("Found {count} {kind} rows where exactly one was expected")]
    Integrity {
        kind: TicketKind,
        tid: String,
        count: usize,
    },

    #[error("{kind} has expired")]
    Expired { kind: TicketKind, tid: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The system CSPRNG could not produce a ticket id.
    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

impl RegistryError {
    /// CAS 2.0 validation error code for this failure.
    ///
    /// Callers map registry failures onto protocol responses; unknown and
    /// expired tickets are both `INVALID_TICKET` from the client's view.
    pub fn cas_code(&self) -> &'static str {
        match self {
            RegistryError::NotFound { .. } | RegistryError::Expired { .. } => "INVALID_TICKET",
            RegistryError::Integrity { .. }
            | RegistryError::Persistence(_)
            | RegistryError::Crypto(_) => "INTERNAL_ERROR",
        }
    }

    /// Ticket kind the error refers to, if any.
    pub fn kind(&self) -> Option<TicketKind> {
        match self {
            RegistryError::NotFound { kind, .. }
            | RegistryError::Integrity { kind, .. }
            | RegistryError::Expired { kind, .. } => Some(*kind),
            RegistryError::Persistence(_) | RegistryError::Crypto(_) => None,
        }
    }
}
