// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use glpi_rest_client::{GlpiClient, GlpiConfig, GlpiError};
use glpi_server_mock::USER_TOKEN;

#[test]
fn session_lifecycle_and_state_errors() {
    let (mock, base) = common::spawn_server();
    let mut client = common::client(&base);

    // Nothing is readable before initiation.
    assert!(matches!(client.session_token(), Err(GlpiError::NoSession)));
    assert!(matches!(client.response_range(), Err(GlpiError::NoPriorRequest)));
    assert!(matches!(client.kill_session(), Err(GlpiError::NoSession)));

    client.init_session().unwrap();
    let token = client.session_token().unwrap().to_string();
    assert!(client.has_session());
    assert_eq!(mock.session_count(), 1);

    assert!(matches!(client.init_session(), Err(GlpiError::SessionAlreadyActive)));

    client.kill_session().unwrap();
    assert!(matches!(client.session_token(), Err(GlpiError::NoSession)));
    assert_eq!(mock.session_count(), 0);

    // Terminating the same token again surfaces the expiry.
    assert!(matches!(client.kill_session_by_token(&token), Err(GlpiError::SessionExpired)));
}

#[test]
fn init_session_rejects_bad_credentials() {
    let (mock, base) = common::spawn_server();
    let mut client =
        GlpiClient::new(GlpiConfig::new(&base, "wrong-app-token", USER_TOKEN)).unwrap();

    match client.init_session() {
        Err(GlpiError::Request(context)) => {
            assert_eq!(context.status, 401);
            assert!(context.body.contains("ERROR_WRONG_APP_TOKEN_PARAMETER"));
            // Credentials never leak into the captured context.
            for (_, value) in &context.request_headers {
                assert!(!value.contains("wrong-app-token"));
            }
        }
        other => panic!("expected a request failure, got {other:?}"),
    }
    assert!(!client.has_session());
    assert_eq!(mock.session_count(), 0);
}

#[test]
fn with_session_always_terminates() {
    let (mock, base) = common::spawn_server();
    let mut client = common::client(&base);

    let session = client.with_session(|c| c.get_full_session()).unwrap();
    assert!(session.get("glpi_currenttime").is_some());
    assert_eq!(mock.session_count(), 0);

    // The operation error wins and the session is still torn down.
    let result: Result<(), _> = client.with_session(|_| Err(GlpiError::NoRange));
    assert!(matches!(result, Err(GlpiError::NoRange)));
    assert_eq!(mock.session_count(), 0);
    assert!(!client.has_session());
}

#[test]
fn profile_and_entity_switching() {
    let (_mock, base) = common::spawn_server();
    let mut client = common::client(&base);
    client.init_session().unwrap();

    let profiles = client.get_my_profiles().unwrap();
    assert!(profiles.iter().any(|p| p["name"] == "Super-Admin"));

    let active = client.get_active_profile().unwrap();
    assert_eq!(active["id"], 1);

    client.change_active_profile(4).unwrap();
    assert!(matches!(
        client.change_active_profile(99),
        Err(GlpiError::ProfileNotFound(99))
    ));

    let entities = client.get_my_entities(true).unwrap();
    assert_eq!(entities.len(), 2);
    let active = client.get_active_entities().unwrap();
    assert_eq!(active["id"], 0);

    client.change_active_entity(71).unwrap();
    match client.change_active_entity(999) {
        Err(GlpiError::EntityRejected(message)) => assert!(message.contains("entity not found")),
        other => panic!("expected an entity rejection, got {other:?}"),
    }

    let config = client.get_glpi_config().unwrap();
    assert!(config.get("url_base").is_some());

    client.kill_session().unwrap();
}
