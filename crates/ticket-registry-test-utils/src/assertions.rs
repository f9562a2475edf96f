//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for ticket rows.

use chrono::{DateTime, Duration, Utc};
use ticket_registry::{LoginTicket, ServiceTicket, Ticket, TicketGrantingTicket, TicketKind};

/// Custom assertions for tickets
///
/// # Example
/// ```rust,ignore
/// lt.assert_valid()
///   .assert_kind_prefix()
///   .assert_expires_near(issued_at + Duration::milliseconds(5000), Duration::seconds(1));
/// ```
pub trait TicketAssertions {
    /// Assert the ticket has not been invalidated
    fn assert_valid(&self) -> &Self;

    /// Assert the ticket has been invalidated
    fn assert_invalidated(&self) -> &Self;

    /// Assert the expiry is within `tolerance` of `expected`
    fn assert_expires_near(&self, expected: DateTime<Utc>, tolerance: Duration) -> &Self;

    /// Assert the tid carries the CAS prefix for its kind
    fn assert_kind_prefix(&self) -> &Self;
}

/// Common view over the three ticket rows
pub trait TicketView {
    fn view_kind(&self) -> TicketKind;
    fn view_tid(&self) -> &str;
    fn view_valid(&self) -> bool;
    fn view_expires(&self) -> DateTime<Utc>;
}

impl TicketView for LoginTicket {
    fn view_kind(&self) -> TicketKind {
        TicketKind::LoginTicket
    }
    fn view_tid(&self) -> &str {
        &self.tid
    }
    fn view_valid(&self) -> bool {
        self.valid
    }
    fn view_expires(&self) -> DateTime<Utc> {
        self.expires
    }
}

impl TicketView for TicketGrantingTicket {
    fn view_kind(&self) -> TicketKind {
        TicketKind::TicketGrantingTicket
    }
    fn view_tid(&self) -> &str {
        &self.tid
    }
    fn view_valid(&self) -> bool {
        self.valid
    }
    fn view_expires(&self) -> DateTime<Utc> {
        self.expires
    }
}

impl TicketView for ServiceTicket {
    fn view_kind(&self) -> TicketKind {
        TicketKind::ServiceTicket
    }
    fn view_tid(&self) -> &str {
        &self.tid
    }
    fn view_valid(&self) -> bool {
        self.valid
    }
    fn view_expires(&self) -> DateTime<Utc> {
        self.expires
    }
}

impl TicketView for Ticket {
    fn view_kind(&self) -> TicketKind {
        self.kind()
    }
    fn view_tid(&self) -> &str {
        self.tid()
    }
    fn view_valid(&self) -> bool {
        self.is_valid()
    }
    fn view_expires(&self) -> DateTime<Utc> {
        self.expires()
    }
}

impl<T: TicketView> TicketAssertions for T {
    fn assert_valid(&self) -> &Self {
        assert!(
            self.view_valid(),
            "Expected {} to be valid",
            self.view_kind()
        );
        self
    }

    fn assert_invalidated(&self) -> &Self {
        assert!(
            !self.view_valid(),
            "Expected {} to be invalidated",
            self.view_kind()
        );
        self
    }

    fn assert_expires_near(&self, expected: DateTime<Utc>, tolerance: Duration) -> &Self {
        let actual = self.view_expires();
        let delta = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            delta <= tolerance,
            "Expected {} to expire near {}, got {} (off by {}ms)",
            self.view_kind(),
            expected,
            actual,
            delta.num_milliseconds()
        );
        self
    }

    fn assert_kind_prefix(&self) -> &Self {
        let prefix = format!("{}-", self.view_kind().prefix());
        assert!(
            self.view_tid().starts_with(&prefix),
            "Expected {} id to start with '{}'",
            self.view_kind(),
            prefix
        );
        self
    }
}
