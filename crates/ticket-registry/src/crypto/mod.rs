//! Ticket identifier generation.
//!
//! Ticket ids are bearer credentials: anyone holding a TGT id can mint
//! service tickets for that session. They are drawn from the system CSPRNG
//! and never logged in plaintext (see `observability::hash_for_correlation`).

use crate::errors::RegistryError;
use crate::models::TicketKind;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::instrument;

/// Random bytes per ticket id (256 bits)
const TICKET_ID_ENTROPY_BYTES: usize = 32;

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, RegistryError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| RegistryError::Crypto(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}

/// Generate a ticket id of the form `<PREFIX>-<base64url>`, e.g. `ST-...`.
#[instrument(skip_all)]
pub fn generate_ticket_id(kind: TicketKind) -> Result<String, RegistryError> {
    let bytes = generate_random_bytes(TICKET_ID_ENTROPY_BYTES)?;
    Ok(format!("{}-{}", kind.prefix(), URL_SAFE_NO_PAD.encode(bytes)))
}
