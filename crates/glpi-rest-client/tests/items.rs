// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use glpi_rest_client::contract::{DeleteOptions, GetItemOptions, ListItemsOptions, PageRange};
use glpi_rest_client::GlpiError;
use serde_json::json;

#[test]
fn item_crud_roundtrip() {
    let (mock, base) = common::spawn_server();
    let mut client = common::client(&base);
    client.init_session().unwrap();

    let created = client.add_item("Computer", &json!({"name": "pc-01", "serial": "abc"})).unwrap();
    assert!(created.succeeded());
    let id = created.id.unwrap();

    let fetched = client.get_item("Computer", id, &GetItemOptions::default()).unwrap();
    assert_eq!(fetched["name"], "pc-01");
    assert_eq!(fetched["serial"], "abc");

    match client.get_item("Computer", 9999, &GetItemOptions::default()) {
        Err(GlpiError::ItemNotFound { item_type, id }) => {
            assert_eq!(item_type, "Computer");
            assert_eq!(id, 9999);
        }
        other => panic!("expected ItemNotFound, got {other:?}"),
    }

    let created = client
        .add_items("Computer", &[json!({"name": "pc-02"}), json!({"name": "pc-03"})])
        .unwrap();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|result| result.succeeded()));

    let updates = client
        .update_items("Computer", &[json!({"id": id, "serial": "xyz"})])
        .unwrap();
    assert_eq!(updates.len(), 1);
    let fetched = client.get_item("Computer", id, &GetItemOptions::default()).unwrap();
    assert_eq!(fetched["serial"], "xyz");

    client.delete_items("Computer", &[id], &DeleteOptions::default()).unwrap();
    let body = mock.last_delete_body().unwrap();
    assert_eq!(body["input"], json!([{"id": id}]));
    // Default flags stay off the wire entirely.
    assert!(body.get("force_purge").is_none());
    assert!(body.get("history").is_none());
    assert!(matches!(
        client.get_item("Computer", id, &GetItemOptions::default()),
        Err(GlpiError::ItemNotFound { .. })
    ));

    client.kill_session().unwrap();
}

#[test]
fn purge_and_history_flags_reach_the_wire() {
    let (mock, base) = common::spawn_server();
    let mut client = common::client(&base);
    client.init_session().unwrap();

    let id = mock.seed_item("Ticket", json!({"name": "broken printer"}));
    let options = DeleteOptions { purge: true, log: false };
    client.delete_items("Ticket", &[id], &options).unwrap();

    let body = mock.last_delete_body().unwrap();
    assert_eq!(body["force_purge"], json!(true));
    assert_eq!(body["history"], json!(false));

    client.kill_session().unwrap();
}

#[test]
fn listing_reports_the_pagination_window() {
    let (mock, base) = common::spawn_server();
    let mut client = common::client(&base);
    client.init_session().unwrap();

    for n in 1..=5 {
        mock.seed_item("Monitor", json!({"name": format!("mon-{n:02}")}));
    }

    let options = ListItemsOptions {
        range: Some(PageRange::new(0, 1).unwrap()),
        ..ListItemsOptions::default()
    };
    let page = client.get_many_items("Monitor", &options).unwrap();
    assert_eq!(page.len(), 2);

    let range = client.response_range().unwrap();
    assert_eq!(range.start, 0);
    assert_eq!(range.end, 1);
    assert_eq!(range.count, 5);
    assert_eq!(range.max, glpi_server_mock::MAX_RANGE);

    // Endpoints without range headers invalidate the window.
    client.get_full_session().unwrap();
    assert!(matches!(client.response_range(), Err(GlpiError::NoRange)));

    client.kill_session().unwrap();
}

#[test]
fn sub_items_are_scoped_to_their_parent() {
    let (mock, base) = common::spawn_server();
    let mut client = common::client(&base);
    client.init_session().unwrap();

    let id = mock.seed_item("Computer", json!({"name": "pc-01"}));
    let logs = client
        .get_sub_items("Computer", id, "Log", &Default::default())
        .unwrap();
    assert!(!logs.is_empty());
    assert_eq!(logs[0]["items_id"], json!(id));

    client.kill_session().unwrap();
}

#[test]
fn session_is_required_for_item_access() {
    let (_mock, base) = common::spawn_server();
    let mut client = common::client(&base);

    assert!(matches!(
        client.get_many_items("Computer", &ListItemsOptions::default()),
        Err(GlpiError::NoSession)
    ));
    assert!(matches!(
        client.add_item("Computer", &json!({"name": "pc"})),
        Err(GlpiError::NoSession)
    ));
}
