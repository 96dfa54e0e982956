//! Full client-to-destination-and-back round trips.

use crate::{spawn_echo_target, Topology, TEST_KEY};

#[tokio::test]
async fn empty_body_round_trip_with_no_encryption() {
    let target = spawn_echo_target().await;
    let topology = Topology::build(2, 2, 8192, None).await;

    let response = topology
        .submit("GET", &format!("http://{target}/"), Vec::new())
        .await;

    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn large_body_round_trip_with_encryption_and_fragmentation() {
    let target = spawn_echo_target().await;
    let topology = Topology::build(2, 2, 8192, Some(TEST_KEY)).await;

    let body: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let response = topology
        .submit("POST", &format!("http://{target}/"), body.clone())
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, body);
}

#[tokio::test]
async fn single_upstream_single_downstream_small_body() {
    let target = spawn_echo_target().await;
    let topology = Topology::build(1, 1, 64, None).await;

    let response = topology
        .submit("POST", &format!("http://{target}/"), b"hello shard".to_vec())
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"hello shard");
}

#[tokio::test]
async fn client_times_out_when_upstream_is_unreachable() {
    // No upstream listener is ever bound at this address, so the request
    // chunk never reaches Central and the client's own timeout fires.
    let mut config = crate::base_config();
    config.role = shardnet_core::wire::NodeRole::Client;
    let client_addr = crate::reserve_addr().await;
    config.client.listen_addr = client_addr.clone();
    config.client.upstreams = vec!["127.0.0.1:1".to_string()];
    config.client.timeout_ms = 300;
    crate::spawn_role(config).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let http = reqwest::Client::new();
    let request = shardnet_core::wire::OutboundRequest {
        method: "GET".to_string(),
        url: "http://example.test/".to_string(),
        headers: std::collections::HashMap::new(),
        body: Vec::new(),
    };
    let response = http
        .post(format!("http://{client_addr}/submit"))
        .json(&request)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::GATEWAY_TIMEOUT);

    let health: shardnet_core::wire::HealthResponse = http
        .get(format!("http://{client_addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.pending_sessions, 0, "timed-out session must be removed from the pending table");
}
