use crate::errors::RegistryError;
use crate::models::{NewTicketGrantingTicket, ServiceLogin, TicketGrantingTicket};
use sqlx::types::Json;
use sqlx::PgPool;

/// Create a new ticket-granting ticket linked to its login ticket
pub async fn create_ticket_granting_ticket(
    pool: &PgPool,
    ticket: &NewTicketGrantingTicket,
) -> Result<TicketGrantingTicket, RegistryError> {
    let tgt = sqlx::query_as::<_, TicketGrantingTicket>(
        r#"
        INSERT INTO ticket_granting_tickets (tid, user_id, lt_id, expires)
        VALUES ($1, $2, $3, $4)
        RETURNING id, tid, user_id, expires, valid, lt_id, extra
        "#,
    )
    .bind(&ticket.tid)
    .bind(&ticket.user_id)
    .bind(ticket.lt_id)
    .bind(ticket.expires)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        RegistryError::Persistence(format!("Failed to insert ticket-granting ticket: {}", e))
    })?;

    Ok(tgt)
}

/// Get all ticket-granting tickets matching a tid
pub async fn get_by_tid(
    pool: &PgPool,
    tid: &str,
) -> Result<Vec<TicketGrantingTicket>, RegistryError> {
    let tickets = sqlx::query_as::<_, TicketGrantingTicket>(
        r#"
        SELECT id, tid, user_id, expires, valid, lt_id, extra
        FROM ticket_granting_tickets
        WHERE tid = $1
        ORDER BY id
        "#,
    )
    .bind(tid)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        RegistryError::Persistence(format!("Failed to query ticket-granting tickets: {}", e))
    })?;

    Ok(tickets)
}

/// Get the ticket-granting tickets a service ticket points at.
///
/// The foreign key guarantees at most one; the caller still checks.
pub async fn get_by_service_ticket(
    pool: &PgPool,
    service_ticket_id: i64,
) -> Result<Vec<TicketGrantingTicket>, RegistryError> {
    let tickets = sqlx::query_as::<_, TicketGrantingTicket>(
        r#"
        SELECT t.id, t.tid, t.user_id, t.expires, t.valid, t.lt_id, t.extra
        FROM ticket_granting_tickets t
        JOIN service_tickets s ON s.tgt_id = t.id
        WHERE s.id = $1
        ORDER BY t.id
        "#,
    )
    .bind(service_ticket_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        RegistryError::Persistence(format!(
            "Failed to query ticket-granting ticket for service ticket: {}",
            e
        ))
    })?;

    Ok(tickets)
}

/// Mark a ticket-granting ticket invalid and return the updated row
pub async fn invalidate(
    pool: &PgPool,
    id: i64,
) -> Result<Option<TicketGrantingTicket>, RegistryError> {
    let tgt = sqlx::query_as::<_, TicketGrantingTicket>(
        r#"
        UPDATE ticket_granting_tickets
        SET valid = false
        WHERE id = $1
        RETURNING id, tid, user_id, expires, valid, lt_id, extra
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        RegistryError::Persistence(format!("Failed to invalidate ticket-granting ticket: {}", e))
    })?;

    Ok(tgt)
}

/// Replace the service login list of the ticket(s) with this tid.
///
/// Returns the number of rows updated.
pub async fn update_service_logins(
    pool: &PgPool,
    tid: &str,
    logins: &[ServiceLogin],
) -> Result<u64, RegistryError> {
    let result = sqlx::query(
        r#"
        UPDATE ticket_granting_tickets
        SET extra = $2
        WHERE tid = $1
        "#,
    )
    .bind(tid)
    .bind(Json(logins))
    .execute(pool)
    .await
    .map_err(|e| RegistryError::Persistence(format!("Failed to update service logins: {}", e)))?;

    Ok(result.rows_affected())
}
