//! Ticket registry: issue, look up, link and invalidate CAS tickets.
//!
//! Every operation is a short sequence of store round trips with no caching,
//! locking or retries. Failures are logged (`error` with the ticket kind and
//! a correlation hash, `debug` with the underlying detail) and returned
//! unchanged. `track_service_login` is the one best-effort operation: it
//! reports an outcome instead of an error.
//!
//! Login tickets are not consumed by `issue_ticket_granting_ticket`; callers
//! that want single use must `invalidate` the login ticket themselves.

use crate::config::{Config, TicketTtls};
use crate::crypto;
use crate::errors::RegistryError;
use crate::models::{
    LoginTicket, NewLoginTicket, NewServiceTicket, NewTicketGrantingTicket, ServiceLogin,
    ServiceLoginOutcome, ServiceTicket, Ticket, TicketGrantingTicket, TicketKind,
};
use crate::observability::metrics::{
    record_error, record_service_login_tracked, record_ticket_invalidation, record_ticket_issuance,
    record_ticket_lookup,
};
use crate::observability::{hash_for_correlation, ErrorCategory};
use crate::store::{PgTicketStore, TicketStore};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use std::time::Instant;
use tracing::instrument;

const LOG_TARGET: &str = "ticket_registry.registry";

/// Façade over a [`TicketStore`] implementing the ticket lifecycle.
///
/// Construct once at startup and share (e.g. behind an `Arc`) with every
/// request handler.
#[derive(Debug)]
pub struct TicketRegistry<S = PgTicketStore> {
    store: S,
    ttls: TicketTtls,
}

impl TicketRegistry<PgTicketStore> {
    /// Connect to PostgreSQL and build a registry from configuration.
    ///
    /// Runs the embedded migrations first when `run_migrations` is set.
    pub async fn connect(config: &Config) -> Result<Self, RegistryError> {
        tracing::info!(
            target: LOG_TARGET,
            max_connections = config.max_connections,
            "Connecting ticket registry to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                tracing::error!(target: LOG_TARGET, "Failed to connect to database");
                tracing::debug!(target: LOG_TARGET, error = %e, "Connection failure detail");
                RegistryError::Persistence(format!("Failed to connect to database: {}", e))
            })?;

        if config.run_migrations {
            crate::MIGRATOR.run(&pool).await.map_err(|e| {
                tracing::error!(target: LOG_TARGET, "Failed to run ticket migrations");
                tracing::debug!(target: LOG_TARGET, error = %e, "Migration failure detail");
                RegistryError::Persistence(format!("Failed to run migrations: {}", e))
            })?;
        }

        tracing::info!(target: LOG_TARGET, "Ticket registry ready");

        Ok(Self::new(PgTicketStore::new(pool), config.ttls))
    }
}

impl<S: TicketStore> TicketRegistry<S> {
    pub fn new(store: S, ttls: TicketTtls) -> Self {
        Self { store, ttls }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ttls(&self) -> &TicketTtls {
        &self.ttls
    }

    // ------------------------------------------------------------------
    // Issuance
    // ------------------------------------------------------------------

    /// Issue a login ticket expiring after the login TTL, or at `expires`.
    #[instrument(
        name = "registry.issue_login_ticket",
        skip_all,
        fields(kind = "login_ticket", status)
    )]
    pub async fn issue_login_ticket(
        &self,
        expires: Option<DateTime<Utc>>,
    ) -> Result<LoginTicket, RegistryError> {
        let start = Instant::now();
        let result = self.issue_login_ticket_internal(expires).await;
        record_issuance(TicketKind::LoginTicket, "issue_login_ticket", &result, start);
        result
    }

    async fn issue_login_ticket_internal(
        &self,
        expires: Option<DateTime<Utc>>,
    ) -> Result<LoginTicket, RegistryError> {
        let kind = TicketKind::LoginTicket;
        let tid = new_ticket_id(kind)?;
        let tid_hash = hash_for_correlation(&tid);
        let expires = expires.unwrap_or_else(|| Utc::now() + self.ttls.login_ticket());

        let lt = self
            .store
            .insert_login_ticket(NewLoginTicket { tid, expires })
            .await
            .map_err(|e| {
                tracing::error!(target: LOG_TARGET, tid_hash = %tid_hash, "Could not insert login ticket");
                log_detail(&e);
                e
            })?;

        tracing::debug!(target: LOG_TARGET, tid_hash = %tid_hash, lt_id = lt.id, "Generated login ticket");
        Ok(lt)
    }

    /// Exchange a live login ticket for a ticket-granting ticket.
    ///
    /// The login ticket is looked up by tid and must exist exactly once and
    /// be unexpired. Its `valid` flag is not consulted and it is not
    /// invalidated here.
    #[instrument(
        name = "registry.issue_ticket_granting_ticket",
        skip_all,
        fields(kind = "ticket_granting_ticket", status)
    )]
    pub async fn issue_ticket_granting_ticket(
        &self,
        login_ticket_id: &str,
        user_id: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        let start = Instant::now();
        let result = self
            .issue_ticket_granting_ticket_internal(login_ticket_id, user_id, expires)
            .await;
        record_issuance(
            TicketKind::TicketGrantingTicket,
            "issue_ticket_granting_ticket",
            &result,
            start,
        );
        result
    }

    async fn issue_ticket_granting_ticket_internal(
        &self,
        login_ticket_id: &str,
        user_id: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        let lt = self.lookup_login_ticket(login_ticket_id).await?;
        ensure_unexpired(TicketKind::LoginTicket, &lt.tid, lt.expires, Some(user_id))?;

        let kind = TicketKind::TicketGrantingTicket;
        let tid = new_ticket_id(kind)?;
        let tid_hash = hash_for_correlation(&tid);
        let expires = expires.unwrap_or_else(|| Utc::now() + self.ttls.ticket_granting_ticket());

        let tgt = self
            .store
            .insert_ticket_granting_ticket(NewTicketGrantingTicket {
                tid,
                user_id: user_id.to_string(),
                lt_id: lt.id,
                expires,
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    target: LOG_TARGET,
                    tid_hash = %tid_hash,
                    user_id = %user_id,
                    "Could not save ticket-granting ticket"
                );
                log_detail(&e);
                e
            })?;

        tracing::debug!(
            target: LOG_TARGET,
            tid_hash = %tid_hash,
            user_id = %user_id,
            lt_id = tgt.lt_id,
            "Generated ticket-granting ticket"
        );
        Ok(tgt)
    }

    /// Mint a service ticket for `service_id` from a live ticket-granting
    /// ticket. An expired parent performs no insert.
    #[instrument(
        name = "registry.issue_service_ticket",
        skip_all,
        fields(kind = "service_ticket", status)
    )]
    pub async fn issue_service_ticket(
        &self,
        ticket_granting_ticket_id: &str,
        service_id: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<ServiceTicket, RegistryError> {
        let start = Instant::now();
        let result = self
            .issue_service_ticket_internal(ticket_granting_ticket_id, service_id, expires)
            .await;
        record_issuance(
            TicketKind::ServiceTicket,
            "issue_service_ticket",
            &result,
            start,
        );
        result
    }

    async fn issue_service_ticket_internal(
        &self,
        ticket_granting_ticket_id: &str,
        service_id: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<ServiceTicket, RegistryError> {
        let tgt = self
            .lookup_ticket_granting_ticket(ticket_granting_ticket_id)
            .await?;
        ensure_unexpired(
            TicketKind::TicketGrantingTicket,
            &tgt.tid,
            tgt.expires,
            Some(&tgt.user_id),
        )?;

        let kind = TicketKind::ServiceTicket;
        let tid = new_ticket_id(kind)?;
        let tid_hash = hash_for_correlation(&tid);
        let expires = expires.unwrap_or_else(|| Utc::now() + self.ttls.service_ticket());

        let st = self
            .store
            .insert_service_ticket(NewServiceTicket {
                tid,
                tgt_id: tgt.id,
                service_id: service_id.to_string(),
                expires,
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    target: LOG_TARGET,
                    tid_hash = %tid_hash,
                    service = %service_id,
                    "Could not save service ticket"
                );
                log_detail(&e);
                e
            })?;

        tracing::debug!(
            target: LOG_TARGET,
            tid_hash = %tid_hash,
            service = %service_id,
            tgt_id = st.tgt_id,
            "Generated service ticket"
        );
        Ok(st)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Fetch the single ticket of `kind` with this tid, without mutation.
    #[instrument(name = "registry.fetch", skip_all, fields(kind = kind.as_str(), status))]
    pub async fn fetch(&self, kind: TicketKind, tid: &str) -> Result<Ticket, RegistryError> {
        let result = self.fetch_internal(kind, tid).await;
        record_status("fetch", &result);
        result
    }

    async fn fetch_internal(&self, kind: TicketKind, tid: &str) -> Result<Ticket, RegistryError> {
        match kind {
            TicketKind::LoginTicket => self.lookup_login_ticket(tid).await.map(Ticket::from),
            TicketKind::TicketGrantingTicket => self
                .lookup_ticket_granting_ticket(tid)
                .await
                .map(Ticket::from),
            TicketKind::ServiceTicket => self.lookup_service_ticket(tid).await.map(Ticket::from),
        }
    }

    pub async fn fetch_login_ticket(&self, tid: &str) -> Result<LoginTicket, RegistryError> {
        self.fetch(TicketKind::LoginTicket, tid)
            .await?
            .into_login_ticket()
            .ok_or_else(|| kind_mismatch(TicketKind::LoginTicket))
    }

    pub async fn fetch_ticket_granting_ticket(
        &self,
        tid: &str,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        self.fetch(TicketKind::TicketGrantingTicket, tid)
            .await?
            .into_ticket_granting_ticket()
            .ok_or_else(|| kind_mismatch(TicketKind::TicketGrantingTicket))
    }

    pub async fn fetch_service_ticket(&self, tid: &str) -> Result<ServiceTicket, RegistryError> {
        self.fetch(TicketKind::ServiceTicket, tid)
            .await?
            .into_service_ticket()
            .ok_or_else(|| kind_mismatch(TicketKind::ServiceTicket))
    }

    /// Resolve the ticket-granting ticket that issued a service ticket.
    ///
    /// A relation yielding zero or several parents is reported with kind
    /// `TicketGrantingTicket` and the service ticket's tid.
    #[instrument(
        name = "registry.fetch_tgt_by_service_ticket",
        skip_all,
        fields(kind = "ticket_granting_ticket", status)
    )]
    pub async fn fetch_ticket_granting_ticket_by_service_ticket(
        &self,
        service_ticket_id: &str,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        let result = self
            .fetch_ticket_granting_ticket_by_service_ticket_internal(service_ticket_id)
            .await;
        record_status("fetch_ticket_granting_ticket_by_service_ticket", &result);
        result
    }

    async fn fetch_ticket_granting_ticket_by_service_ticket_internal(
        &self,
        service_ticket_id: &str,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        let st_hash = hash_for_correlation(service_ticket_id);
        let st = self.lookup_service_ticket(service_ticket_id).await?;

        let parents = self.store.ticket_granting_tickets_for(&st).await;
        let tgt = single(TicketKind::TicketGrantingTicket, service_ticket_id, parents).map_err(
            |e| {
                tracing::error!(
                    target: LOG_TARGET,
                    st_hash = %st_hash,
                    tgt_id = st.tgt_id,
                    "Could not resolve ticket-granting ticket for service ticket"
                );
                log_detail(&e);
                e
            },
        )?;

        Ok(tgt)
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Set `valid = false` on the single ticket of `kind` with this tid and
    /// return the updated row. Invalidating twice is not an error.
    #[instrument(name = "registry.invalidate", skip_all, fields(kind = kind.as_str(), status))]
    pub async fn invalidate(&self, kind: TicketKind, tid: &str) -> Result<Ticket, RegistryError> {
        let result = self.invalidate_internal(kind, tid).await;
        record_status("invalidate", &result);
        record_ticket_invalidation(kind.as_str(), status_label(&result));
        result
    }

    async fn invalidate_internal(
        &self,
        kind: TicketKind,
        tid: &str,
    ) -> Result<Ticket, RegistryError> {
        let tid_hash = hash_for_correlation(tid);
        let ticket = self.fetch_internal(kind, tid).await?;

        let updated = self
            .store
            .invalidate(kind, ticket.id())
            .await
            .and_then(|t| {
                t.ok_or_else(|| RegistryError::NotFound {
                    kind,
                    tid: tid.to_string(),
                })
            })
            .map_err(|e| {
                tracing::error!(
                    target: LOG_TARGET,
                    kind = kind.as_str(),
                    tid_hash = %tid_hash,
                    "Could not update ticket"
                );
                log_detail(&e);
                e
            })?;

        tracing::debug!(
            target: LOG_TARGET,
            kind = kind.as_str(),
            tid_hash = %tid_hash,
            "Invalidated ticket"
        );
        Ok(updated)
    }

    pub async fn invalidate_login_ticket(&self, tid: &str) -> Result<LoginTicket, RegistryError> {
        self.invalidate(TicketKind::LoginTicket, tid)
            .await?
            .into_login_ticket()
            .ok_or_else(|| kind_mismatch(TicketKind::LoginTicket))
    }

    pub async fn invalidate_ticket_granting_ticket(
        &self,
        tid: &str,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        self.invalidate(TicketKind::TicketGrantingTicket, tid)
            .await?
            .into_ticket_granting_ticket()
            .ok_or_else(|| kind_mismatch(TicketKind::TicketGrantingTicket))
    }

    pub async fn invalidate_service_ticket(
        &self,
        tid: &str,
    ) -> Result<ServiceTicket, RegistryError> {
        self.invalidate(TicketKind::ServiceTicket, tid)
            .await?
            .into_service_ticket()
            .ok_or_else(|| kind_mismatch(TicketKind::ServiceTicket))
    }

    // ------------------------------------------------------------------
    // Single logout bookkeeping
    // ------------------------------------------------------------------

    /// Record that the session `ticket_granting_ticket` logged into the
    /// service of `service_ticket`, for single logout.
    ///
    /// Entries are deduplicated by `logout_url`. The in-memory ticket is
    /// updated before the store is written, so it reflects the new entry
    /// even when the write fails. Store failures are logged and reported as
    /// [`ServiceLoginOutcome::NotPersisted`], never as an error.
    #[instrument(
        name = "registry.track_service_login",
        skip_all,
        fields(kind = "ticket_granting_ticket", status)
    )]
    pub async fn track_service_login(
        &self,
        service_ticket: &ServiceTicket,
        ticket_granting_ticket: &mut TicketGrantingTicket,
        logout_url: &str,
    ) -> ServiceLoginOutcome {
        let tid_hash = hash_for_correlation(&ticket_granting_ticket.tid);

        let already_tracked = ticket_granting_ticket
            .service_logins()
            .iter()
            .any(|login| login.logout_url == logout_url);

        let outcome = if already_tracked {
            tracing::debug!(
                target: LOG_TARGET,
                tid_hash = %tid_hash,
                logout_url = %logout_url,
                "Service login already tracked"
            );
            ServiceLoginOutcome::AlreadyTracked
        } else {
            ticket_granting_ticket.extra.0.push(ServiceLogin {
                service: service_ticket.service_id.clone(),
                logout_url: logout_url.to_string(),
            });

            match self
                .store
                .update_service_logins(
                    &ticket_granting_ticket.tid,
                    ticket_granting_ticket.service_logins(),
                )
                .await
            {
                Ok(0) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        tid_hash = %tid_hash,
                        "No ticket-granting ticket updated while tracking service login"
                    );
                    ServiceLoginOutcome::NotPersisted
                }
                Ok(_) => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        tid_hash = %tid_hash,
                        service = %service_ticket.service_id,
                        "Tracked service login"
                    );
                    ServiceLoginOutcome::Recorded
                }
                Err(e) => {
                    tracing::error!(
                        target: LOG_TARGET,
                        tid_hash = %tid_hash,
                        "Could not persist service login"
                    );
                    log_detail(&e);
                    ServiceLoginOutcome::NotPersisted
                }
            }
        };

        let status = match outcome {
            ServiceLoginOutcome::NotPersisted => "error",
            _ => "success",
        };
        tracing::Span::current().record("status", status);
        record_service_login_tracked(outcome.as_str());
        outcome
    }

    /// Release the store's connections. Calling it again is harmless.
    pub async fn close(&self) {
        self.store.close().await;
        tracing::info!(target: LOG_TARGET, "Ticket registry closed");
    }

    // ------------------------------------------------------------------
    // Unique lookups
    // ------------------------------------------------------------------

    async fn lookup_login_ticket(&self, tid: &str) -> Result<LoginTicket, RegistryError> {
        let rows = self.store.find_login_tickets(tid).await;
        lookup_result(TicketKind::LoginTicket, tid, rows)
    }

    async fn lookup_ticket_granting_ticket(
        &self,
        tid: &str,
    ) -> Result<TicketGrantingTicket, RegistryError> {
        let rows = self.store.find_ticket_granting_tickets(tid).await;
        lookup_result(TicketKind::TicketGrantingTicket, tid, rows)
    }

    async fn lookup_service_ticket(&self, tid: &str) -> Result<ServiceTicket, RegistryError> {
        let rows = self.store.find_service_tickets(tid).await;
        lookup_result(TicketKind::ServiceTicket, tid, rows)
    }
}

/// Reduce a query result to exactly one row.
fn single<T>(
    kind: TicketKind,
    tid: &str,
    rows: Result<Vec<T>, RegistryError>,
) -> Result<T, RegistryError> {
    let rows = rows?;
    let count = rows.len();
    let mut rows = rows.into_iter();

    match (rows.next(), count) {
        (Some(row), 1) => Ok(row),
        (None, _) => Err(RegistryError::NotFound {
            kind,
            tid: tid.to_string(),
        }),
        _ => Err(RegistryError::Integrity {
            kind,
            tid: tid.to_string(),
            count,
        }),
    }
}

/// `single` plus lookup logging and metrics.
fn lookup_result<T>(
    kind: TicketKind,
    tid: &str,
    rows: Result<Vec<T>, RegistryError>,
) -> Result<T, RegistryError> {
    let result = single(kind, tid, rows);

    let outcome = match &result {
        Ok(_) => "found",
        Err(RegistryError::NotFound { .. }) => "not_found",
        Err(RegistryError::Integrity { .. }) => "integrity",
        Err(_) => "error",
    };
    record_ticket_lookup(kind.as_str(), outcome);

    if let Err(e) = &result {
        let tid_hash = hash_for_correlation(tid);
        match e {
            RegistryError::NotFound { .. } => {
                tracing::error!(target: LOG_TARGET, kind = kind.as_str(), tid_hash = %tid_hash, "No ticket found");
            }
            RegistryError::Integrity { count, .. } => {
                tracing::error!(
                    target: LOG_TARGET,
                    kind = kind.as_str(),
                    tid_hash = %tid_hash,
                    count = *count,
                    "Found too many tickets"
                );
            }
            _ => {
                tracing::error!(target: LOG_TARGET, kind = kind.as_str(), tid_hash = %tid_hash, "Could not query tickets");
            }
        }
        log_detail(e);
    }

    result
}

/// Reject parent tickets past their expiry.
fn ensure_unexpired(
    kind: TicketKind,
    tid: &str,
    expires: DateTime<Utc>,
    user_id: Option<&str>,
) -> Result<(), RegistryError> {
    let tid_hash = hash_for_correlation(tid);

    if expires < Utc::now() {
        tracing::error!(
            target: LOG_TARGET,
            kind = kind.as_str(),
            tid_hash = %tid_hash,
            user_id = user_id.unwrap_or_default(),
            "Ticket expired"
        );
        return Err(RegistryError::Expired {
            kind,
            tid: tid.to_string(),
        });
    }

    Ok(())
}

fn new_ticket_id(kind: TicketKind) -> Result<String, RegistryError> {
    crypto::generate_ticket_id(kind).map_err(|e| {
        tracing::error!(target: LOG_TARGET, kind = kind.as_str(), "Could not generate ticket id");
        log_detail(&e);
        e
    })
}

fn kind_mismatch(kind: TicketKind) -> RegistryError {
    tracing::error!(target: LOG_TARGET, kind = kind.as_str(), "Store returned a different ticket kind");
    RegistryError::Persistence(format!("Store returned a ticket that is not a {}", kind))
}

/// Debug-level dump of the underlying failure.
///
/// `RegistryError`'s Display never includes the tid, so this is safe to log.
fn log_detail(err: &RegistryError) {
    tracing::debug!(target: LOG_TARGET, error = %err, "Failure detail");
}

fn status_label<T>(result: &Result<T, RegistryError>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

fn record_status<T>(operation: &str, result: &Result<T, RegistryError>) {
    tracing::Span::current().record("status", status_label(result));
    if let Err(e) = result {
        record_error(operation, ErrorCategory::from(e).as_str());
    }
}

fn record_issuance<T>(
    kind: TicketKind,
    operation: &str,
    result: &Result<T, RegistryError>,
    start: Instant,
) {
    record_status(operation, result);
    record_ticket_issuance(kind.as_str(), status_label(result), start.elapsed());
}
