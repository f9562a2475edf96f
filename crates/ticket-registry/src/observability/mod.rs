//! Observability for the ticket registry
//!
//! # Privacy by Default
//!
//! Registry operations are instrumented with `#[instrument(skip_all)]` and an
//! explicit field allow-list. Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (ticket kind, status, row ids)
//! - **HASHED**: Must be SHA-256 hashed for correlation (ticket ids)
//! - **NEVER**: Must never appear in logs (ticket ids in plaintext)
//!
//! User ids and service URLs are logged as-is; they are identifiers, not
//! credentials.

pub mod metrics;

use crate::errors::RegistryError;
use sha2::{Digest, Sha256};

/// Hash a ticket id for correlation in logs (SHA-256, first 8 hex chars)
///
/// This is NOT a secure commitment. It lets an operator follow one ticket
/// across log lines without the log itself granting access to the session.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    hex::encode(result.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Ticket missing or expired; a normal outcome of client behaviour
    InvalidTicket,
    /// Duplicate rows or broken relations
    Integrity,
    /// Database and cryptographic failures
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidTicket => "invalid_ticket",
            ErrorCategory::Integrity => "integrity",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&RegistryError> for ErrorCategory {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::NotFound { .. } | RegistryError::Expired { .. } => {
                ErrorCategory::InvalidTicket
            }
            RegistryError::Integrity { .. } => ErrorCategory::Integrity,
            RegistryError::Persistence(_) | RegistryError::Crypto(_) => ErrorCategory::Internal,
        }
    }
}
