//! Single logout bookkeeping tests

use ticket_registry::{ServiceLogin, ServiceLoginOutcome, TicketRegistry, TicketTtls};
use ticket_registry::{ServiceTicket, TicketGrantingTicket};
use ticket_registry_test_utils::*;

async fn session(
    registry: &TicketRegistry<MockTicketStore>,
    service: &str,
) -> Result<(TicketGrantingTicket, ServiceTicket), anyhow::Error> {
    let lt = registry.issue_login_ticket(None).await?;
    let tgt = registry
        .issue_ticket_granting_ticket(&lt.tid, TEST_USER_ALICE, None)
        .await?;
    let st = registry.issue_service_ticket(&tgt.tid, service, None).await?;
    Ok((tgt, st))
}

#[tokio::test]
async fn test_track_service_login_records_entry() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = TicketRegistry::new(store.clone(), TicketTtls::default());
    let (mut tgt, st) = session(&registry, TEST_SERVICE_APP).await?;

    let outcome = registry
        .track_service_login(&st, &mut tgt, TEST_LOGOUT_URL_APP)
        .await;

    let expected = vec![ServiceLogin {
        service: TEST_SERVICE_APP.to_string(),
        logout_url: TEST_LOGOUT_URL_APP.to_string(),
    }];
    assert_eq!(outcome, ServiceLoginOutcome::Recorded);
    assert_eq!(tgt.service_logins(), expected.as_slice());
    assert_eq!(store.stored_service_logins(&tgt.tid), Some(expected));

    Ok(())
}

#[tokio::test]
async fn test_track_service_login_deduplicates_by_logout_url() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = TicketRegistry::new(store.clone(), TicketTtls::default());
    let (mut tgt, st) = session(&registry, TEST_SERVICE_APP).await?;

    let first = registry
        .track_service_login(&st, &mut tgt, TEST_LOGOUT_URL_APP)
        .await;
    let second = registry
        .track_service_login(&st, &mut tgt, TEST_LOGOUT_URL_APP)
        .await;

    assert_eq!(first, ServiceLoginOutcome::Recorded);
    assert_eq!(second, ServiceLoginOutcome::AlreadyTracked);
    assert_eq!(tgt.service_logins().len(), 1);
    assert_eq!(
        store.stored_service_logins(&tgt.tid).map(|logins| logins.len()),
        Some(1)
    );

    Ok(())
}

#[tokio::test]
async fn test_track_service_login_keeps_login_order() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = TicketRegistry::new(store.clone(), TicketTtls::default());
    let (mut tgt, app_st) = session(&registry, TEST_SERVICE_APP).await?;
    let wiki_st = registry
        .issue_service_ticket(&tgt.tid, TEST_SERVICE_WIKI, None)
        .await?;

    registry
        .track_service_login(&app_st, &mut tgt, TEST_LOGOUT_URL_APP)
        .await;
    registry
        .track_service_login(&wiki_st, &mut tgt, TEST_LOGOUT_URL_WIKI)
        .await;

    let services: Vec<&str> = tgt
        .service_logins()
        .iter()
        .map(|login| login.service.as_str())
        .collect();
    assert_eq!(services, vec![TEST_SERVICE_APP, TEST_SERVICE_WIKI]);

    let refetched = registry.fetch_ticket_granting_ticket(&tgt.tid).await?;
    assert_eq!(refetched.service_logins(), tgt.service_logins());

    Ok(())
}

#[tokio::test]
async fn test_track_service_login_store_failure_is_not_an_error() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = TicketRegistry::new(store.clone(), TicketTtls::default());
    let (mut tgt, st) = session(&registry, TEST_SERVICE_APP).await?;

    store.fail_updates(true);
    let outcome = registry
        .track_service_login(&st, &mut tgt, TEST_LOGOUT_URL_APP)
        .await;

    assert_eq!(outcome, ServiceLoginOutcome::NotPersisted);
    // In-memory ticket still carries the entry
    assert_eq!(tgt.service_logins().len(), 1);
    assert_eq!(store.stored_service_logins(&tgt.tid), Some(Vec::new()));

    Ok(())
}

#[tokio::test]
async fn test_track_service_login_on_vanished_ticket() -> Result<(), anyhow::Error> {
    let store = MockTicketStore::new();
    let registry = TicketRegistry::new(store.clone(), TicketTtls::default());
    let (mut tgt, st) = session(&registry, TEST_SERVICE_APP).await?;

    tgt.tid = TEST_MISSING_TID.to_string();
    let outcome = registry
        .track_service_login(&st, &mut tgt, TEST_LOGOUT_URL_APP)
        .await;

    assert_eq!(outcome, ServiceLoginOutcome::NotPersisted);

    Ok(())
}
