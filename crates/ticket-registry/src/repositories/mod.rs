//! Per-table database access for the ticket tables.

pub mod login_tickets;
pub mod service_tickets;
pub mod ticket_granting_tickets;
