//! End-to-end delivery through a relay chain and a gateway, including the
//! hop-rotation handoff between two relays.

use std::collections::HashMap;

use shardnet_core::wire::NodeRole;

use crate::{base_config, reserve_addr, spawn_echo_target, spawn_role};

#[tokio::test]
async fn request_reaches_its_target_through_a_two_hop_relay_chain_and_gateway() {
    let target = spawn_echo_target().await;

    let gateway_addr = reserve_addr().await;
    let mut gateway_config = base_config();
    gateway_config.role = NodeRole::Gateway;
    gateway_config.gateway.listen_addr = gateway_addr.clone();
    gateway_config.gateway.node_secrets =
        HashMap::from([("relay-b".to_string(), "relay-b-secret".to_string())]);
    spawn_role(gateway_config).await;

    let relay_b_addr = reserve_addr().await;
    let mut relay_b_config = base_config();
    relay_b_config.role = NodeRole::Relay;
    relay_b_config.relay.listen_addr = relay_b_addr.clone();
    relay_b_config.relay.node_id = "relay-b".to_string();
    relay_b_config.relay.gateway_url = Some(format!("http://{gateway_addr}"));
    relay_b_config.relay.gateway_secret = Some("relay-b-secret".to_string());
    relay_b_config.relay.flush_interval_secs = 1;
    spawn_role(relay_b_config).await;

    let relay_a_addr = reserve_addr().await;
    let mut relay_a_config = base_config();
    relay_a_config.role = NodeRole::Relay;
    relay_a_config.relay.listen_addr = relay_a_addr.clone();
    relay_a_config.relay.node_id = "relay-a".to_string();
    // A long rotation window keeps the single configured next hop selected
    // for the whole test, regardless of wall-clock timing.
    relay_a_config.relay.next_hops = vec![relay_b_addr.clone()];
    relay_a_config.relay.rotation_period_secs = 3600;
    relay_a_config.relay.flush_interval_secs = 1;
    spawn_role(relay_a_config).await;

    // Central hands off to relay-a instead of issuing the outbound call
    // itself; everything upstream of Central is the same topology used for
    // the direct-dispatch pipeline tests.
    let central_addr = reserve_addr().await;
    let client_addr = reserve_addr().await;
    let upstream_addr = reserve_addr().await;
    let downstream_addr = reserve_addr().await;

    let mut upstream_config = base_config();
    upstream_config.role = NodeRole::Upstream;
    upstream_config.upstream.listen_addr = upstream_addr.clone();
    upstream_config.upstream.central_addr = central_addr.clone();
    spawn_role(upstream_config).await;

    let mut downstream_config = base_config();
    downstream_config.role = NodeRole::Downstream;
    downstream_config.downstream.listen_addr = downstream_addr.clone();
    spawn_role(downstream_config).await;

    let mut central_config = base_config();
    central_config.role = NodeRole::Central;
    central_config.central.listen_addr = central_addr.clone();
    central_config.central.downstreams = vec![downstream_addr];
    central_config.central.relay_addr = Some(relay_a_addr);
    spawn_role(central_config).await;

    let mut client_config = base_config();
    client_config.role = NodeRole::Client;
    client_config.client.listen_addr = client_addr.clone();
    client_config.client.upstreams = vec![upstream_addr];
    client_config.client.timeout_ms = 10_000;
    spawn_role(client_config).await;

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let http = reqwest::Client::new();
    let request = shardnet_core::wire::OutboundRequest {
        method: "POST".to_string(),
        url: format!("http://{target}/"),
        headers: HashMap::new(),
        body: b"through two relays and a gateway".to_vec(),
    };
    let response: shardnet_core::wire::OutboundResponse = http
        .post(format!("http://{client_addr}/submit"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"through two relays and a gateway");
}

#[tokio::test]
async fn relay_without_a_configured_gateway_or_next_hop_forwards_synchronously_and_returns_ok() {
    // Mixing is disabled (the default), so receive_relay forwards inline via
    // forward_one and answers with the outcome rather than buffering. No
    // next hop and no gateway configured is a dead-end forward_one must not
    // panic on; the handler still answers 200 since the response to the
    // caller only reflects that the relay accepted and processed the call.
    let relay_addr = reserve_addr().await;
    let mut relay_config = base_config();
    relay_config.role = NodeRole::Relay;
    relay_config.relay.listen_addr = relay_addr.clone();
    spawn_role(relay_config).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let http = reqwest::Client::new();
    let envelope = shardnet_core::wire::RelayEnvelope {
        session_id: shardnet_core::chunk::SessionId::generate(),
        outbound: shardnet_core::wire::OutboundRequest {
            method: "GET".to_string(),
            url: "http://example.test/".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        },
        callback_addr: "127.0.0.1:1".to_string(),
    };

    let response = http
        .post(format!("http://{relay_addr}/relay"))
        .json(&envelope)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let health: shardnet_core::wire::HealthResponse = http
        .get(format!("http://{relay_addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.pending_sessions, 0, "nothing is ever buffered when mixing is disabled");
}

#[tokio::test]
async fn mixing_enabled_buffers_the_envelope_and_flushes_it_on_the_next_tick() {
    let relay_addr = reserve_addr().await;
    let mut relay_config = base_config();
    relay_config.role = NodeRole::Relay;
    relay_config.relay.listen_addr = relay_addr.clone();
    relay_config.relay.mixing = true;
    relay_config.relay.flush_interval_secs = 1;
    spawn_role(relay_config).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let http = reqwest::Client::new();
    let envelope = shardnet_core::wire::RelayEnvelope {
        session_id: shardnet_core::chunk::SessionId::generate(),
        outbound: shardnet_core::wire::OutboundRequest {
            method: "GET".to_string(),
            url: "http://example.test/".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        },
        callback_addr: "127.0.0.1:1".to_string(),
    };

    let response = http
        .post(format!("http://{relay_addr}/relay"))
        .json(&envelope)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    let health: shardnet_core::wire::HealthResponse = http
        .get(format!("http://{relay_addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.pending_sessions, 1, "the envelope sits in the mixing buffer until the next flush");

    tokio::time::sleep(std::time::Duration::from_millis(1_200)).await;

    let health: shardnet_core::wire::HealthResponse = http
        .get(format!("http://{relay_addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.pending_sessions, 0, "the flush loop drains the buffer even when forwarding fails");
}
