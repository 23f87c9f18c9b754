// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::net::TcpListener;
use std::thread;

use glpi_rest_client::{GlpiClient, GlpiConfig};
use glpi_server_mock::{MockGlpi, APP_TOKEN, USER_TOKEN};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Spin up the mock GLPI server on a random port, returning the state
/// handle and the base URL to point a client at.
pub fn spawn_server() -> (MockGlpi, String) {
    init_tracing();
    let mock = MockGlpi::default();
    let server_mock = mock.clone();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime
            .block_on(async {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                glpi_server_mock::run(listener, server_mock).await
            })
            .unwrap();
    });

    (mock, format!("http://{addr}"))
}

pub fn client(base_url: &str) -> GlpiClient {
    GlpiClient::new(GlpiConfig::new(base_url, APP_TOKEN, USER_TOKEN)).unwrap()
}
