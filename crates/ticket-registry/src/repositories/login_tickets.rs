use crate::errors::RegistryError;
use crate::models::{LoginTicket, NewLoginTicket};
use sqlx::PgPool;

/// Create a new login ticket
pub async fn create_login_ticket(
    pool: &PgPool,
    ticket: &NewLoginTicket,
) -> Result<LoginTicket, RegistryError> {
    let lt = sqlx::query_as::<_, LoginTicket>(
        r#"
        INSERT INTO login_tickets (tid, expires)
        VALUES ($1, $2)
        RETURNING id, tid, expires, valid
        "#,
    )
    .bind(&ticket.tid)
    .bind(ticket.expires)
    .fetch_one(pool)
    .await
    .map_err(|e| RegistryError::Persistence(format!("Failed to insert login ticket: {}", e)))?;

    Ok(lt)
}

/// Get all login tickets matching a tid.
///
/// Returns every match so the caller can tell "none" from "too many".
pub async fn get_by_tid(pool: &PgPool, tid: &str) -> Result<Vec<LoginTicket>, RegistryError> {
    let tickets = sqlx::query_as::<_, LoginTicket>(
        r#"
        SELECT id, tid, expires, valid
        FROM login_tickets
        WHERE tid = $1
        ORDER BY id
        "#,
    )
    .bind(tid)
    .fetch_all(pool)
    .await
    .map_err(|e| RegistryError::Persistence(format!("Failed to query login tickets: {}", e)))?;

    Ok(tickets)
}

/// Mark a login ticket invalid and return the updated row
pub async fn invalidate(pool: &PgPool, id: i64) -> Result<Option<LoginTicket>, RegistryError> {
    let lt = sqlx::query_as::<_, LoginTicket>(
        r#"
        UPDATE login_tickets
        SET valid = false
        WHERE id = $1
        RETURNING id, tid, expires, valid
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| RegistryError::Persistence(format!("Failed to invalidate login ticket: {}", e)))?;

    Ok(lt)
}
