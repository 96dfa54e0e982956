//! Gateway registration and bearer-token authentication.

use std::collections::HashMap;

use shardnet_core::wire::{
    OutboundRequest, RegisterRequest, RegisterResponse, HEADER_AUTH_TOKEN, HEADER_NODE_ID,
};
use shardnet_node::handlers::gateway::GatewayState;
use shardnet_node::router::gateway_router;

use crate::{base_config, reserve_addr, spawn_echo_target};

async fn spawn_gateway(secrets: HashMap<String, String>) -> String {
    let mut config = base_config().gateway;
    config.node_secrets = secrets;
    spawn_gateway_with_config(config).await
}

async fn spawn_gateway_with_config(mut config: shardnet_core::config::GatewayConfig) -> String {
    let addr = reserve_addr().await;
    config.listen_addr = addr.clone();
    let state = GatewayState::new(config);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    let router = gateway_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    tokio::spawn(shardnet_node::handlers::gateway::run_batch_loop(state));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    addr
}

#[tokio::test]
async fn unknown_node_id_is_rejected_at_register() {
    let addr = spawn_gateway(HashMap::from([("relay-0".to_string(), "shared-secret".to_string())])).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("http://{addr}/register"))
        .json(&RegisterRequest {
            node_id: "relay-unknown".to_string(),
            secret: "shared-secret".to_string(),
        })
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn correct_secret_yields_a_64_character_hex_token() {
    let addr = spawn_gateway(HashMap::from([("relay-0".to_string(), "shared-secret".to_string())])).await;
    let http = reqwest::Client::new();

    let response: RegisterResponse = http
        .post(format!("http://{addr}/register"))
        .json(&RegisterRequest {
            node_id: "relay-0".to_string(),
            secret: "shared-secret".to_string(),
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response.node_id, "relay-0");
    assert_eq!(response.token.len(), 64);
    assert!(response.token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn valid_token_authorizes_a_proxy_call_and_a_flipped_bit_does_not() {
    let target = spawn_echo_target().await;
    let addr = spawn_gateway(HashMap::from([("relay-0".to_string(), "shared-secret".to_string())])).await;
    let http = reqwest::Client::new();

    let registered: RegisterResponse = http
        .post(format!("http://{addr}/register"))
        .json(&RegisterRequest {
            node_id: "relay-0".to_string(),
            secret: "shared-secret".to_string(),
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let outbound = OutboundRequest {
        method: "POST".to_string(),
        url: format!("http://{target}/"),
        headers: HashMap::new(),
        body: b"via the gateway".to_vec(),
    };

    let ok = http
        .post(format!("http://{addr}/proxy"))
        .header(HEADER_NODE_ID, "relay-0")
        .header(HEADER_AUTH_TOKEN, &registered.token)
        .json(&outbound)
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), reqwest::StatusCode::OK);

    let mut tampered = registered.token.clone();
    let flipped = match tampered.as_bytes()[0] {
        b'0' => '1',
        _ => '0',
    };
    tampered.replace_range(0..1, &flipped.to_string());

    let rejected = http
        .post(format!("http://{addr}/proxy"))
        .header(HEADER_NODE_ID, "relay-0")
        .header(HEADER_AUTH_TOKEN, &tampered)
        .json(&outbound)
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mixing_enabled_answers_202_and_the_batch_loop_issues_the_call_later() {
    let target = spawn_echo_target().await;

    let mut config = base_config().gateway;
    config.node_secrets = HashMap::from([("relay-0".to_string(), "shared-secret".to_string())]);
    config.mixing = true;
    config.batch_interval_secs = 1;
    let addr = spawn_gateway_with_config(config).await;
    let http = reqwest::Client::new();

    let registered: RegisterResponse = http
        .post(format!("http://{addr}/register"))
        .json(&RegisterRequest {
            node_id: "relay-0".to_string(),
            secret: "shared-secret".to_string(),
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let outbound = OutboundRequest {
        method: "POST".to_string(),
        url: format!("http://{target}/"),
        headers: HashMap::new(),
        body: b"batched through the gateway".to_vec(),
    };

    let queued = http
        .post(format!("http://{addr}/proxy"))
        .header(HEADER_NODE_ID, "relay-0")
        .header(HEADER_AUTH_TOKEN, &registered.token)
        .json(&outbound)
        .send()
        .await
        .unwrap();
    // Mixing enabled means the call is queued, not issued inline; the caller
    // gets no response body to wait on, only the accepted status.
    assert_eq!(queued.status(), reqwest::StatusCode::ACCEPTED);

    // Give the 1s batch ticker a chance to drain the queue and issue the
    // call against the echo target; there's no callback path to observe
    // this through the gateway itself, so this just confirms the queued
    // call doesn't panic or hang the batch loop.
    tokio::time::sleep(std::time::Duration::from_millis(1_200)).await;
}
