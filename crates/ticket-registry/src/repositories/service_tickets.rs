use crate::errors::RegistryError;
use crate::models::{NewServiceTicket, ServiceTicket};
use sqlx::PgPool;

/// Create a new service ticket under a ticket-granting ticket
pub async fn create_service_ticket(
    pool: &PgPool,
    ticket: &NewServiceTicket,
) -> Result<ServiceTicket, RegistryError> {
    let st = sqlx::query_as::<_, ServiceTicket>(
        r#"
        INSERT INTO service_tickets (tid, tgt_id, service_id, expires)
        VALUES ($1, $2, $3, $4)
        RETURNING id, tid, tgt_id, service_id, expires, valid
        "#,
    )
    .bind(&ticket.tid)
    .bind(ticket.tgt_id)
    .bind(&ticket.service_id)
    .bind(ticket.expires)
    .fetch_one(pool)
    .await
    .map_err(|e| RegistryError::Persistence(format!("Failed to insert service ticket: {}", e)))?;

    Ok(st)
}

/// Get all service tickets matching a tid
pub async fn get_by_tid(pool: &PgPool, tid: &str) -> Result<Vec<ServiceTicket>, RegistryError> {
    let tickets = sqlx::query_as::<_, ServiceTicket>(
        r#"
        SELECT id, tid, tgt_id, service_id, expires, valid
        FROM service_tickets
        WHERE tid = $1
        ORDER BY id
        "#,
    )
    .bind(tid)
    .fetch_all(pool)
    .await
    .map_err(|e| RegistryError::Persistence(format!("Failed to query service tickets: {}", e)))?;

    Ok(tickets)
}

/// Mark a service ticket invalid and return the updated row
pub async fn invalidate(pool: &PgPool, id: i64) -> Result<Option<ServiceTicket>, RegistryError> {
    let st = sqlx::query_as::<_, ServiceTicket>(
        r#"
        UPDATE service_tickets
        SET valid = false
        WHERE id = $1
        RETURNING id, tid, tgt_id, service_id, expires, valid
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        RegistryError::Persistence(format!("Failed to invalidate service ticket: {}", e))
    })?;

    Ok(st)
}
