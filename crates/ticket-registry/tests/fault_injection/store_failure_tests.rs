//! Store failure tests
//!
//! Every registry operation must surface store failures as
//! `RegistryError::Persistence` without writing partial rows.

use chrono::{Duration, Utc};
use ticket_registry::{RegistryError, TicketKind, TicketRegistry, TicketTtls};
use ticket_registry_test_utils::*;

fn registry(store: &MockTicketStore) -> TicketRegistry<MockTicketStore> {
    TicketRegistry::new(store.clone(), TicketTtls::default())
}

#[tokio::test]
async fn test_insert_failure_propagates() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    store.fail_inserts(true);
    let registry = registry(&store);

    let err = registry
        .issue_login_ticket(None)
        .await
        .expect_err("insert failure should propagate");

    assert!(matches!(err, RegistryError::Persistence(_)));
    assert_eq!(err.cas_code(), "INTERNAL_ERROR");
    assert!(store.login_tickets().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_ticket_granting_ticket_insert_failure_leaves_login_ticket() -> Result<(), anyhow::Error>
{
    let store = MockTicketStore::new();
    let registry = registry(&store);
    let lt = registry.issue_login_ticket(None).await?;

    store.fail_inserts(true);
    let result = registry
        .issue_ticket_granting_ticket(&lt.tid, TEST_USER_ALICE, None)
        .await;

    assert!(matches!(result, Err(RegistryError::Persistence(_))));
    assert!(store.ticket_granting_tickets().is_empty());
    store.fail_inserts(false);
    registry.fetch_login_ticket(&lt.tid).await?.assert_valid();

    Ok(())
}

#[tokio::test]
async fn test_query_failure_propagates() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    store.seed_login_ticket(TEST_LT_ID, Utc::now() + Duration::minutes(1), true);
    store.fail_queries(true);
    let registry = registry(&store);

    let fetch = registry.fetch(TicketKind::LoginTicket, TEST_LT_ID).await;
    assert!(matches!(fetch, Err(RegistryError::Persistence(_))));

    let issue = registry
        .issue_ticket_granting_ticket(TEST_LT_ID, TEST_USER_ALICE, None)
        .await;
    assert!(matches!(issue, Err(RegistryError::Persistence(_))));
    assert_eq!(store.insert_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_update_failure_leaves_ticket_valid() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);
    let lt = registry.issue_login_ticket(None).await?;

    store.fail_updates(true);
    let result = registry.invalidate(TicketKind::LoginTicket, &lt.tid).await;

    assert!(matches!(result, Err(RegistryError::Persistence(_))));
    assert!(store.login_tickets().iter().all(|t| t.valid));

    Ok(())
}

#[tokio::test]
async fn test_operations_fail_after_close() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);
    let lt = registry.issue_login_ticket(None).await?;

    registry.close().await;
    registry.close().await;

    assert!(store.is_closed());
    assert_eq!(store.close_count(), 2);

    let result = registry.fetch_login_ticket(&lt.tid).await;
    assert!(matches!(result, Err(RegistryError::Persistence(_))));

    let result = registry.issue_login_ticket(None).await;
    assert!(matches!(result, Err(RegistryError::Persistence(_))));

    Ok(())
}
