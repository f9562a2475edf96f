//! In-memory ticket store for registry tests.
//!
//! Mirrors the PostgreSQL store's behaviour closely enough for the registry:
//! tids are not unique (so integrity failures can be seeded), invalidation
//! is update-and-fetch by row id, and every operation can be made to fail.
//!
//! # Example
//!
//! ```rust,ignore
//! use ticket_registry_test_utils::MockTicketStore;
//!
//! let store = MockTicketStore::new();
//! store.seed_login_ticket("LT-dup", in_one_minute(), true);
//! store.seed_login_ticket("LT-dup", in_one_minute(), true);
//! store.fail_inserts(true);
//!
//! let registry = TicketRegistry::new(store.clone(), TicketTtls::default());
//! ```

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ticket_registry::models::{Json, NewLoginTicket, NewServiceTicket, NewTicketGrantingTicket};
use ticket_registry::{
    LoginTicket, RegistryError, ServiceLogin, ServiceTicket, Ticket, TicketGrantingTicket,
    TicketKind, TicketStore,
};

/// Mock ticket store. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MockTicketStore {
    inner: Arc<Mutex<MockStoreInner>>,
    inserts: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    next_id: i64,
    login_tickets: Vec<LoginTicket>,
    ticket_granting_tickets: Vec<TicketGrantingTicket>,
    service_tickets: Vec<ServiceTicket>,
    /// Additional (service ticket id, ticket-granting ticket id) relations
    extra_relations: Vec<(i64, i64)>,
    fail_inserts: bool,
    fail_queries: bool,
    fail_updates: bool,
    closed: bool,
}

impl MockStoreInner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_open(&self) -> Result<(), RegistryError> {
        if self.closed {
            return Err(RegistryError::Persistence(
                "Mock store: pool is closed".to_string(),
            ));
        }
        Ok(())
    }
}

impl MockTicketStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------

    /// Make every insert fail with a persistence error.
    pub fn fail_inserts(&self, fail: bool) {
        self.inner.lock().unwrap().fail_inserts = fail;
    }

    /// Make every lookup fail with a persistence error.
    pub fn fail_queries(&self, fail: bool) {
        self.inner.lock().unwrap().fail_queries = fail;
    }

    /// Make invalidation and service-login updates fail.
    pub fn fail_updates(&self, fail: bool) {
        self.inner.lock().unwrap().fail_updates = fail;
    }

    // ------------------------------------------------------------------
    // Seeding (bypasses insert counters and failure flags)
    // ------------------------------------------------------------------

    /// Insert a login ticket row directly. Duplicate tids are allowed.
    pub fn seed_login_ticket(&self, tid: &str, expires: DateTime<Utc>, valid: bool) -> LoginTicket {
        let mut inner = self.inner.lock().unwrap();
        let lt = LoginTicket {
            id: inner.allocate_id(),
            tid: tid.to_string(),
            expires,
            valid,
        };
        inner.login_tickets.push(lt.clone());
        lt
    }

    /// Insert a ticket-granting ticket row directly. Duplicate tids are allowed.
    pub fn seed_ticket_granting_ticket(
        &self,
        tid: &str,
        user_id: &str,
        lt_id: i64,
        expires: DateTime<Utc>,
        valid: bool,
    ) -> TicketGrantingTicket {
        let mut inner = self.inner.lock().unwrap();
        let tgt = TicketGrantingTicket {
            id: inner.allocate_id(),
            tid: tid.to_string(),
            user_id: user_id.to_string(),
            expires,
            valid,
            lt_id,
            extra: Json(Vec::new()),
        };
        inner.ticket_granting_tickets.push(tgt.clone());
        tgt
    }

    /// Insert a service ticket row directly. Duplicate tids are allowed.
    pub fn seed_service_ticket(
        &self,
        tid: &str,
        tgt_id: i64,
        service_id: &str,
        expires: DateTime<Utc>,
        valid: bool,
    ) -> ServiceTicket {
        let mut inner = self.inner.lock().unwrap();
        let st = ServiceTicket {
            id: inner.allocate_id(),
            tid: tid.to_string(),
            tgt_id,
            service_id: service_id.to_string(),
            expires,
            valid,
        };
        inner.service_tickets.push(st.clone());
        st
    }

    /// Relate a service ticket to one more ticket-granting ticket, beyond
    /// its `tgt_id`, so the relation yields several parents.
    pub fn link_service_ticket(&self, service_ticket_id: i64, ticket_granting_ticket_id: i64) {
        self.inner
            .lock()
            .unwrap()
            .extra_relations
            .push((service_ticket_id, ticket_granting_ticket_id));
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Number of successful inserts through the `TicketStore` interface.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn login_tickets(&self) -> Vec<LoginTicket> {
        self.inner.lock().unwrap().login_tickets.clone()
    }

    pub fn ticket_granting_tickets(&self) -> Vec<TicketGrantingTicket> {
        self.inner.lock().unwrap().ticket_granting_tickets.clone()
    }

    pub fn service_tickets(&self) -> Vec<ServiceTicket> {
        self.inner.lock().unwrap().service_tickets.clone()
    }

    /// Stored service login list of the first ticket-granting ticket with this tid.
    pub fn stored_service_logins(&self, tid: &str) -> Option<Vec<ServiceLogin>> {
        self.inner
            .lock()
            .unwrap()
            .ticket_granting_tickets
            .iter()
            .find(|t| t.tid == tid)
            .map(|t| t.extra.0.clone())
    }

    fn insert_guard(&self) -> Result<std::sync::MutexGuard<'_, MockStoreInner>, RegistryError> {
        let inner = self.inner.lock().unwrap();
        inner.check_open()?;
        if inner.fail_inserts {
            return Err(RegistryError::Persistence(
                "Mock store: insert failed".to_string(),
            ));
        }
        Ok(inner)
    }

    fn query_guard(&self) -> Result<std::sync::MutexGuard<'_, MockStoreInner>, RegistryError> {
        let inner = self.inner.lock().unwrap();
        inner.check_open()?;
        if inner.fail_queries {
            return Err(RegistryError::Persistence(
                "Mock store: query failed".to_string(),
            ));
        }
        Ok(inner)
    }

    fn update_guard(&self) -> Result<std::sync::MutexGuard<'_, MockStoreInner>, RegistryError> {
        let inner = self.inner.lock().unwrap();
        inner.check_open()?;
        if inner.fail_updates {
            return Err(RegistryError::Persistence(
                "Mock store: update failed".to_string(),
            ));
        }
        Ok(inner)
    }
}

#[async_trait::async_trait]
impl TicketStore for MockTicketStore {
    async fn insert_login_ticket(
        &self,
        ticket: NewLoginTicket,
    ) -> Result<LoginTicket, RegistryError> {
        let mut inner = self.insert_guard()?;
        let lt = LoginTicket {
            id: inner.allocate_id(),
            tid: ticket.tid,
            expires: ticket.expires,
            valid: true,
        };
        inner.login_tickets.push(lt.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(lt)
    }

    async fn insert_ticket_granting_ticket(
        &self,
        ticket: NewTicketGrantingTicket,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        let mut inner = self.insert_guard()?;
        if !inner.login_tickets.iter().any(|lt| lt.id == ticket.lt_id) {
            return Err(RegistryError::Persistence(
                "Mock store: lt_id violates foreign key".to_string(),
            ));
        }
        let tgt = TicketGrantingTicket {
            id: inner.allocate_id(),
            tid: ticket.tid,
            user_id: ticket.user_id,
            expires: ticket.expires,
            valid: true,
            lt_id: ticket.lt_id,
            extra: Json(Vec::new()),
        };
        inner.ticket_granting_tickets.push(tgt.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(tgt)
    }

    async fn insert_service_ticket(
        &self,
        ticket: NewServiceTicket,
    ) -> Result<ServiceTicket, RegistryError> {
        let mut inner = self.insert_guard()?;
        if !inner
            .ticket_granting_tickets
            .iter()
            .any(|tgt| tgt.id == ticket.tgt_id)
        {
            return Err(RegistryError::Persistence(
                "Mock store: tgt_id violates foreign key".to_string(),
            ));
        }
        let st = ServiceTicket {
            id: inner.allocate_id(),
            tid: ticket.tid,
            tgt_id: ticket.tgt_id,
            service_id: ticket.service_id,
            expires: ticket.expires,
            valid: true,
        };
        inner.service_tickets.push(st.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(st)
    }

    async fn find_login_tickets(&self, tid: &str) -> Result<Vec<LoginTicket>, RegistryError> {
        let inner = self.query_guard()?;
        Ok(inner
            .login_tickets
            .iter()
            .filter(|t| t.tid == tid)
            .cloned()
            .collect())
    }

    async fn find_ticket_granting_tickets(
        &self,
        tid: &str,
    ) -> Result<Vec<TicketGrantingTicket>, RegistryError> {
        let inner = self.query_guard()?;
        Ok(inner
            .ticket_granting_tickets
            .iter()
            .filter(|t| t.tid == tid)
            .cloned()
            .collect())
    }

    async fn find_service_tickets(&self, tid: &str) -> Result<Vec<ServiceTicket>, RegistryError> {
        let inner = self.query_guard()?;
        Ok(inner
            .service_tickets
            .iter()
            .filter(|t| t.tid == tid)
            .cloned()
            .collect())
    }

    async fn invalidate(
        &self,
        kind: TicketKind,
        id: i64,
    ) -> Result<Option<Ticket>, RegistryError> {
        let mut inner = self.update_guard()?;
        let updated = match kind {
            TicketKind::LoginTicket => inner
                .login_tickets
                .iter_mut()
                .find(|t| t.id == id)
                .map(|t| {
                    t.valid = false;
                    Ticket::from(t.clone())
                }),
            TicketKind::TicketGrantingTicket => inner
                .ticket_granting_tickets
                .iter_mut()
                .find(|t| t.id == id)
                .map(|t| {
                    t.valid = false;
                    Ticket::from(t.clone())
                }),
            TicketKind::ServiceTicket => inner
                .service_tickets
                .iter_mut()
                .find(|t| t.id == id)
                .map(|t| {
                    t.valid = false;
                    Ticket::from(t.clone())
                }),
        };
        Ok(updated)
    }

    async fn ticket_granting_tickets_for(
        &self,
        service_ticket: &ServiceTicket,
    ) -> Result<Vec<TicketGrantingTicket>, RegistryError> {
        let inner = self.query_guard()?;
        Ok(inner
            .ticket_granting_tickets
            .iter()
            .filter(|t| {
                t.id == service_ticket.tgt_id
                    || inner
                        .extra_relations
                        .contains(&(service_ticket.id, t.id))
            })
            .cloned()
            .collect())
    }

    async fn update_service_logins(
        &self,
        tid: &str,
        logins: &[ServiceLogin],
    ) -> Result<u64, RegistryError> {
        let mut inner = self.update_guard()?;
        let mut updated = 0;
        for tgt in inner
            .ticket_granting_tickets
            .iter_mut()
            .filter(|t| t.tid == tid)
        {
            tgt.extra.0 = logins.to_vec();
            updated += 1;
        }
        Ok(updated)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().unwrap().closed = true;
    }
}
