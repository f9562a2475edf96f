//! # Ticket Registry Test Utilities
//!
//! Shared test utilities for the ticket registry.
//!
//! This crate provides:
//! - An in-memory `TicketStore` with failure injection (`MockTicketStore`)
//! - Fixed test ids (tids, users, service URLs)
//! - Custom assertions (`TicketAssertions` trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ticket_registry::{TicketRegistry, TicketTtls};
//! use ticket_registry_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let store = MockTicketStore::new();
//!     let registry = TicketRegistry::new(store.clone(), TicketTtls::default());
//!
//!     let lt = registry.issue_login_ticket(None).await?;
//!     lt.assert_valid().assert_kind_prefix();
//! }
//! ```

pub mod assertions;
pub mod mock_store;
pub mod test_ids;

// Re-export commonly used items
pub use assertions::*;
pub use mock_store::*;
pub use test_ids::*;
