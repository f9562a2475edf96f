//! Ticket issuance tests

use chrono::{Duration, Utc};
use ticket_registry::config::MAX_TICKET_TTL_MS;
use ticket_registry::{RegistryError, TicketKind, TicketRegistry, TicketTtls};
use ticket_registry_test_utils::*;

fn registry(store: &MockTicketStore) -> TicketRegistry<MockTicketStore> {
    TicketRegistry::new(store.clone(), TicketTtls::default())
}

#[tokio::test]
async fn test_issue_login_ticket_uses_default_ttl() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let issued_at = Utc::now();
    let lt = registry.issue_login_ticket(None).await?;

    lt.assert_valid()
        .assert_kind_prefix()
        .assert_expires_near(issued_at + Duration::milliseconds(5000), Duration::seconds(1));
    assert_eq!(store.login_tickets().len(), 1);
    assert_eq!(store.insert_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_issue_login_ticket_with_explicit_expiry() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let expires = Utc::now() + Duration::minutes(10);
    let lt = registry.issue_login_ticket(Some(expires)).await?;

    assert_eq!(lt.expires, expires);

    Ok(())
}

#[tokio::test]
async fn test_issue_login_ticket_honours_configured_ttl() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let ttls = TicketTtls {
        login_ticket_ms: 60_000,
        ..TicketTtls::default()
    };
    let registry = TicketRegistry::new(store.clone(), ttls);

    let issued_at = Utc::now();
    let lt = registry.issue_login_ticket(None).await?;

    lt.assert_expires_near(issued_at + Duration::seconds(60), Duration::seconds(1));

    Ok(())
}

#[tokio::test]
async fn test_issued_ticket_ids_are_unique() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let first = registry.issue_login_ticket(None).await?;
    let second = registry.issue_login_ticket(None).await?;

    assert_ne!(first.tid, second.tid);
    assert_eq!(first.tid.len(), "LT-".len() + 43);

    Ok(())
}

#[tokio::test]
async fn test_issue_ticket_granting_ticket_links_login_ticket() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let lt = registry.issue_login_ticket(None).await?;
    let issued_at = Utc::now();
    let tgt = registry
        .issue_ticket_granting_ticket(&lt.tid, TEST_USER_ALICE, None)
        .await?;

    tgt.assert_valid()
        .assert_kind_prefix()
        .assert_expires_near(issued_at + Duration::milliseconds(15000), Duration::seconds(1));
    assert_eq!(tgt.lt_id, lt.id);
    assert_eq!(tgt.user_id, TEST_USER_ALICE);
    assert!(tgt.service_logins().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_issue_ticket_granting_ticket_does_not_consume_login_ticket(
) -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let lt = registry.issue_login_ticket(None).await?;
    registry
        .issue_ticket_granting_ticket(&lt.tid, TEST_USER_ALICE, None)
        .await?;

    registry.fetch_login_ticket(&lt.tid).await?.assert_valid();

    Ok(())
}

#[tokio::test]
async fn test_issue_ticket_granting_ticket_unknown_login_ticket() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let result = registry
        .issue_ticket_granting_ticket(TEST_MISSING_TID, TEST_USER_ALICE, None)
        .await;

    assert!(matches!(
        result,
        Err(RegistryError::NotFound { kind: TicketKind::LoginTicket, ref tid }) if tid == TEST_MISSING_TID
    ));
    assert!(store.ticket_granting_tickets().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_issue_ticket_granting_ticket_expired_login_ticket() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    store.seed_login_ticket(TEST_LT_ID, Utc::now() - Duration::seconds(1), true);
    let registry = registry(&store);

    let result = registry
        .issue_ticket_granting_ticket(TEST_LT_ID, TEST_USER_ALICE, None)
        .await;

    assert!(matches!(
        result,
        Err(RegistryError::Expired { kind: TicketKind::LoginTicket, .. })
    ));
    assert!(store.ticket_granting_tickets().is_empty());
    assert_eq!(store.insert_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_issue_ticket_granting_ticket_ignores_login_ticket_validity(
) -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let lt = store.seed_login_ticket(TEST_LT_ID, Utc::now() + Duration::minutes(1), false);
    let registry = registry(&store);

    let tgt = registry
        .issue_ticket_granting_ticket(TEST_LT_ID, TEST_USER_ALICE, None)
        .await?;

    tgt.assert_valid();
    assert_eq!(tgt.lt_id, lt.id);
    assert_eq!(store.ticket_granting_tickets().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_issue_ticket_granting_ticket_duplicate_login_tickets() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let expires = Utc::now() + Duration::minutes(1);
    store.seed_login_ticket(TEST_DUPLICATE_TID, expires, true);
    store.seed_login_ticket(TEST_DUPLICATE_TID, expires, true);
    let registry = registry(&store);

    let result = registry
        .issue_ticket_granting_ticket(TEST_DUPLICATE_TID, TEST_USER_ALICE, None)
        .await;

    assert!(matches!(
        result,
        Err(RegistryError::Integrity { kind: TicketKind::LoginTicket, count: 2, .. })
    ));
    assert!(store.ticket_granting_tickets().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_issue_service_ticket_links_ticket_granting_ticket() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let lt = registry.issue_login_ticket(None).await?;
    let tgt = registry
        .issue_ticket_granting_ticket(&lt.tid, TEST_USER_ALICE, None)
        .await?;
    let issued_at = Utc::now();
    let st = registry
        .issue_service_ticket(&tgt.tid, TEST_SERVICE_APP, None)
        .await?;

    st.assert_valid()
        .assert_kind_prefix()
        .assert_expires_near(issued_at + Duration::milliseconds(5000), Duration::seconds(1));
    assert_eq!(st.tgt_id, tgt.id);
    assert_eq!(st.service_id, TEST_SERVICE_APP);

    Ok(())
}

#[tokio::test]
async fn test_issue_service_ticket_expired_ticket_granting_ticket() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let lt = store.seed_login_ticket(TEST_LT_ID, Utc::now() + Duration::minutes(1), true);
    store.seed_ticket_granting_ticket(
        TEST_TGT_ID,
        TEST_USER_ALICE,
        lt.id,
        Utc::now() - Duration::seconds(1),
        true,
    );
    let registry = registry(&store);

    let result = registry
        .issue_service_ticket(TEST_TGT_ID, TEST_SERVICE_APP, None)
        .await;

    assert!(matches!(
        result,
        Err(RegistryError::Expired { kind: TicketKind::TicketGrantingTicket, ref tid }) if tid == TEST_TGT_ID
    ));
    assert!(store.service_tickets().is_empty());
    assert_eq!(store.insert_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_issue_service_ticket_from_invalidated_unexpired_ticket_granting_ticket(
) -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let lt = registry.issue_login_ticket(None).await?;
    let tgt = registry
        .issue_ticket_granting_ticket(&lt.tid, TEST_USER_ALICE, None)
        .await?;
    registry.invalidate_ticket_granting_ticket(&tgt.tid).await?;

    let st = registry
        .issue_service_ticket(&tgt.tid, TEST_SERVICE_APP, None)
        .await?;

    st.assert_valid();
    assert_eq!(st.tgt_id, tgt.id);
    assert_eq!(store.service_tickets().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_issue_with_clamped_ttl_does_not_overflow() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let ttls = TicketTtls {
        login_ticket_ms: u64::MAX,
        ..TicketTtls::default()
    };
    let registry = TicketRegistry::new(store.clone(), ttls);

    let issued_at = Utc::now();
    let lt = registry.issue_login_ticket(None).await?;

    lt.assert_expires_near(
        issued_at + Duration::milliseconds(MAX_TICKET_TTL_MS as i64),
        Duration::seconds(1),
    );

    Ok(())
}

#[tokio::test]
async fn test_issue_service_ticket_unknown_ticket_granting_ticket() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = registry(&store);

    let result = registry
        .issue_service_ticket(TEST_MISSING_TID, TEST_SERVICE_APP, None)
        .await;

    assert!(matches!(
        result,
        Err(RegistryError::NotFound { kind: TicketKind::TicketGrantingTicket, .. })
    ));

    Ok(())
}
