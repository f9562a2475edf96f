//! Storage seam for the ticket registry.
//!
//! `TicketStore` is the set of database capabilities the registry needs:
//! inserts, lookups by tid, update-and-fetch invalidation, the service
//! ticket to ticket-granting ticket relation, and a partial update of the
//! service login list. `PgTicketStore` implements it on PostgreSQL.

use crate::errors::RegistryError;
use crate::models::{
    LoginTicket, NewLoginTicket, NewServiceTicket, NewTicketGrantingTicket, ServiceLogin,
    ServiceTicket, Ticket, TicketGrantingTicket, TicketKind,
};
use crate::observability::metrics::record_db_query;
use crate::repositories::{login_tickets, service_tickets, ticket_granting_tickets};
use sqlx::PgPool;
use std::future::Future;
use std::time::Instant;

/// Trait for ticket persistence (enables mocking).
#[async_trait::async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_login_ticket(&self, ticket: NewLoginTicket)
        -> Result<LoginTicket, RegistryError>;

    async fn insert_ticket_granting_ticket(
        &self,
        ticket: NewTicketGrantingTicket,
    ) -> Result<TicketGrantingTicket, RegistryError>;

    async fn insert_service_ticket(
        &self,
        ticket: NewServiceTicket,
    ) -> Result<ServiceTicket, RegistryError>;

    /// All login tickets with this tid (normally zero or one).
    async fn find_login_tickets(&self, tid: &str) -> Result<Vec<LoginTicket>, RegistryError>;

    /// All ticket-granting tickets with this tid (normally zero or one).
    async fn find_ticket_granting_tickets(
        &self,
        tid: &str,
    ) -> Result<Vec<TicketGrantingTicket>, RegistryError>;

    /// All service tickets with this tid (normally zero or one).
    async fn find_service_tickets(&self, tid: &str) -> Result<Vec<ServiceTicket>, RegistryError>;

    /// Set `valid = false` on the row with this id and return it.
    ///
    /// Returns `Ok(None)` if the row vanished between lookup and update.
    async fn invalidate(&self, kind: TicketKind, id: i64)
        -> Result<Option<Ticket>, RegistryError>;

    /// Ticket-granting tickets related to a service ticket.
    async fn ticket_granting_tickets_for(
        &self,
        service_ticket: &ServiceTicket,
    ) -> Result<Vec<TicketGrantingTicket>, RegistryError>;

    /// Overwrite the service login list of the ticket-granting ticket with
    /// this tid. Returns the number of rows updated.
    async fn update_service_logins(
        &self,
        tid: &str,
        logins: &[ServiceLogin],
    ) -> Result<u64, RegistryError>;

    /// Release underlying resources. Safe to call more than once.
    async fn close(&self);
}

/// PostgreSQL-backed ticket store.
#[derive(Debug, Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Run a repository call and record its duration and status.
async fn timed<T, F>(operation: &str, kind: TicketKind, fut: F) -> Result<T, RegistryError>
where
    F: Future<Output = Result<T, RegistryError>>,
{
    let start = Instant::now();
    let result = fut.await;
    let status = if result.is_ok() { "success" } else { "error" };
    record_db_query(operation, kind.table(), status, start.elapsed());
    result
}

#[async_trait::async_trait]
impl TicketStore for PgTicketStore {
    async fn insert_login_ticket(
        &self,
        ticket: NewLoginTicket,
    ) -> Result<LoginTicket, RegistryError> {
        timed(
            "insert",
            TicketKind::LoginTicket,
            login_tickets::create_login_ticket(&self.pool, &ticket),
        )
        .await
    }

    async fn insert_ticket_granting_ticket(
        &self,
        ticket: NewTicketGrantingTicket,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        timed(
            "insert",
            TicketKind::TicketGrantingTicket,
            ticket_granting_tickets::create_ticket_granting_ticket(&self.pool, &ticket),
        )
        .await
    }

    async fn insert_service_ticket(
        &self,
        ticket: NewServiceTicket,
    ) -> Result<ServiceTicket, RegistryError> {
        timed(
            "insert",
            TicketKind::ServiceTicket,
            service_tickets::create_service_ticket(&self.pool, &ticket),
        )
        .await
    }

    async fn find_login_tickets(&self, tid: &str) -> Result<Vec<LoginTicket>, RegistryError> {
        timed(
            "select",
            TicketKind::LoginTicket,
            login_tickets::get_by_tid(&self.pool, tid),
        )
        .await
    }

    async fn find_ticket_granting_tickets(
        &self,
        tid: &str,
    ) -> Result<Vec<TicketGrantingTicket>, RegistryError> {
        timed(
            "select",
            TicketKind::TicketGrantingTicket,
            ticket_granting_tickets::get_by_tid(&self.pool, tid),
        )
        .await
    }

    async fn find_service_tickets(&self, tid: &str) -> Result<Vec<ServiceTicket>, RegistryError> {
        timed(
            "select",
            TicketKind::ServiceTicket,
            service_tickets::get_by_tid(&self.pool, tid),
        )
        .await
    }

    async fn invalidate(
        &self,
        kind: TicketKind,
        id: i64,
    ) -> Result<Option<Ticket>, RegistryError> {
        match kind {
            TicketKind::LoginTicket => timed("update", kind, login_tickets::invalidate(&self.pool, id))
                .await
                .map(|t| t.map(Ticket::from)),
            TicketKind::TicketGrantingTicket => timed(
                "update",
                kind,
                ticket_granting_tickets::invalidate(&self.pool, id),
            )
            .await
            .map(|t| t.map(Ticket::from)),
            TicketKind::ServiceTicket => {
                timed("update", kind, service_tickets::invalidate(&self.pool, id))
                    .await
                    .map(|t| t.map(Ticket::from))
            }
        }
    }

    async fn ticket_granting_tickets_for(
        &self,
        service_ticket: &ServiceTicket,
    ) -> Result<Vec<TicketGrantingTicket>, RegistryError> {
        timed(
            "select",
            TicketKind::TicketGrantingTicket,
            ticket_granting_tickets::get_by_service_ticket(&self.pool, service_ticket.id),
        )
        .await
    }

    async fn update_service_logins(
        &self,
        tid: &str,
        logins: &[ServiceLogin],
    ) -> Result<u64, RegistryError> {
        timed(
            "update",
            TicketKind::TicketGrantingTicket,
            ticket_granting_tickets::update_service_logins(&self.pool, tid, logins),
        )
        .await
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
        }
    }
}
