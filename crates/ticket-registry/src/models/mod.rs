use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

pub use sqlx::types::Json;

/// Ticket kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    LoginTicket,
    TicketGrantingTicket,
    ServiceTicket,
}

impl TicketKind {
    /// Identifier prefix for this kind, per CAS protocol convention
    pub fn prefix(&self) -> &'static str {
        match self {
            TicketKind::LoginTicket => "LT",
            TicketKind::TicketGrantingTicket => "TGT",
            TicketKind::ServiceTicket => "ST",
        }
    }

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            TicketKind::LoginTicket => "login_tickets",
            TicketKind::TicketGrantingTicket => "ticket_granting_tickets",
            TicketKind::ServiceTicket => "service_tickets",
        }
    }

    /// Bounded label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketKind::LoginTicket => "login_ticket",
            TicketKind::TicketGrantingTicket => "ticket_granting_ticket",
            TicketKind::ServiceTicket => "service_ticket",
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketKind::LoginTicket => "login ticket",
            TicketKind::TicketGrantingTicket => "ticket-granting ticket",
            TicketKind::ServiceTicket => "service ticket",
        };
        f.write_str(name)
    }
}

impl FromStr for TicketKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login_ticket" | "LT" => Ok(TicketKind::LoginTicket),
            "ticket_granting_ticket" | "TGT" => Ok(TicketKind::TicketGrantingTicket),
            "service_ticket" | "ST" => Ok(TicketKind::ServiceTicket),
            _ => Err(format!("Invalid ticket kind: {}", s)),
        }
    }
}

/// Login ticket model (maps to login_tickets table)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LoginTicket {
    pub id: i64,
    pub tid: String,
    pub expires: DateTime<Utc>,
    pub valid: bool,
}

/// Ticket-granting ticket model (maps to ticket_granting_tickets table)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TicketGrantingTicket {
    pub id: i64,
    pub tid: String,
    pub user_id: String,
    pub expires: DateTime<Utc>,
    pub valid: bool,
    pub lt_id: i64,
    /// Services logged into under this session, in login order
    pub extra: Json<Vec<ServiceLogin>>,
}

impl TicketGrantingTicket {
    pub fn service_logins(&self) -> &[ServiceLogin] {
        &self.extra.0
    }
}

/// Service ticket model (maps to service_tickets table)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ServiceTicket {
    pub id: i64,
    pub tid: String,
    pub tgt_id: i64,
    pub service_id: String,
    pub expires: DateTime<Utc>,
    pub valid: bool,
}

/// A service a session has logged into, kept for single logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLogin {
    pub service: String,
    #[serde(rename = "logoutUrl")]
    pub logout_url: String,
}

/// Any of the three ticket rows, for kind-generic operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ticket {
    LoginTicket(LoginTicket),
    TicketGrantingTicket(TicketGrantingTicket),
    ServiceTicket(ServiceTicket),
}

impl Ticket {
    pub fn kind(&self) -> TicketKind {
        match self {
            Ticket::LoginTicket(_) => TicketKind::LoginTicket,
            Ticket::TicketGrantingTicket(_) => TicketKind::TicketGrantingTicket,
            Ticket::ServiceTicket(_) => TicketKind::ServiceTicket,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Ticket::LoginTicket(t) => t.id,
            Ticket::TicketGrantingTicket(t) => t.id,
            Ticket::ServiceTicket(t) => t.id,
        }
    }

    pub fn tid(&self) -> &str {
        match self {
            Ticket::LoginTicket(t) => &t.tid,
            Ticket::TicketGrantingTicket(t) => &t.tid,
            Ticket::ServiceTicket(t) => &t.tid,
        }
    }

    pub fn expires(&self) -> DateTime<Utc> {
        match self {
            Ticket::LoginTicket(t) => t.expires,
            Ticket::TicketGrantingTicket(t) => t.expires,
            Ticket::ServiceTicket(t) => t.expires,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Ticket::LoginTicket(t) => t.valid,
            Ticket::TicketGrantingTicket(t) => t.valid,
            Ticket::ServiceTicket(t) => t.valid,
        }
    }

    /// True once `now` is past the expiry timestamp.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires() < now
    }

    pub fn into_login_ticket(self) -> Option<LoginTicket> {
        match self {
            Ticket::LoginTicket(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_ticket_granting_ticket(self) -> Option<TicketGrantingTicket> {
        match self {
            Ticket::TicketGrantingTicket(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_service_ticket(self) -> Option<ServiceTicket> {
        match self {
            Ticket::ServiceTicket(t) => Some(t),
            _ => None,
        }
    }
}

impl From<LoginTicket> for Ticket {
    fn from(t: LoginTicket) -> Self {
        Ticket::LoginTicket(t)
    }
}

impl From<TicketGrantingTicket> for Ticket {
    fn from(t: TicketGrantingTicket) -> Self {
        Ticket::TicketGrantingTicket(t)
    }
}

impl From<ServiceTicket> for Ticket {
    fn from(t: ServiceTicket) -> Self {
        Ticket::ServiceTicket(t)
    }
}

/// Fields for a login ticket insert
#[derive(Debug, Clone)]
pub struct NewLoginTicket {
    pub tid: String,
    pub expires: DateTime<Utc>,
}

/// Fields for a ticket-granting ticket insert
#[derive(Debug, Clone)]
pub struct NewTicketGrantingTicket {
    pub tid: String,
    pub user_id: String,
    pub lt_id: i64,
    pub expires: DateTime<Utc>,
}

/// Fields for a service ticket insert
#[derive(Debug, Clone)]
pub struct NewServiceTicket {
    pub tid: String,
    pub tgt_id: i64,
    pub service_id: String,
    pub expires: DateTime<Utc>,
}

/// Result of recording a service login against a session.
///
/// Tracking is best-effort; callers may ignore this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLoginOutcome {
    /// Appended and persisted
    Recorded,
    /// An entry with the same logout URL already existed; nothing written
    AlreadyTracked,
    /// Appended in memory but the store rejected the update
    NotPersisted,
}

impl ServiceLoginOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceLoginOutcome::Recorded => "recorded",
            ServiceLoginOutcome::AlreadyTracked => "already_tracked",
            ServiceLoginOutcome::NotPersisted => "not_persisted",
        }
    }
}
