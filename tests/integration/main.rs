//! End-to-end pipeline tests.
//!
//! Every node role runs as a router object against a real loopback listener
//! in this same process, per the redesign note that a global HTTP mux should
//! give way to per-node router objects precisely so a test can stand up a
//! whole topology without spawning separate daemon processes.

use std::collections::HashMap;
use std::net::SocketAddr;

use shardnet_core::config::{
    CentralConfig, ClientConfig, DownstreamConfig, EncryptionConfig, GatewayConfig, RelayConfig,
    ShardnetConfig, UpstreamConfig,
};
use shardnet_core::wire::NodeRole;
use shardnet_node::role;

mod gateway_auth;
mod pipeline;
mod relay_chain;

/// Bind an ephemeral loopback port and hand back its address as a string,
/// without holding the listener open — the caller needs the address before
/// constructing the config that the real listener will be built from.
async fn reserve_addr() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Start one node role and return the address it's listening on. The
/// background tasks role::build spawns (sweeps, relay flush/registration)
/// are detached deliberately: this process's tokio runtime tears them down
/// when the test function's runtime is dropped.
async fn spawn_role(config: ShardnetConfig) -> String {
    let runtime = role::build(config);
    let addr: SocketAddr = runtime.listen_addr.parse().expect("valid listen addr");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, runtime.router).await.ok();
    });
    std::mem::forget(runtime.tasks);
    addr.to_string()
}

fn base_config() -> ShardnetConfig {
    ShardnetConfig {
        role: NodeRole::Client,
        client: ClientConfig::default(),
        upstream: UpstreamConfig::default(),
        central: CentralConfig::default(),
        downstream: DownstreamConfig::default(),
        relay: RelayConfig::default(),
        gateway: GatewayConfig::default(),
    }
}

fn encryption(key_hex: &str) -> EncryptionConfig {
    EncryptionConfig {
        enabled: true,
        key_hex: Some(key_hex.to_string()),
    }
}

pub const TEST_KEY: &str = "1111111111111111111111111111111111111111111111111111111111111111";

/// A complete client -> N upstreams -> central -> N downstreams -> client
/// topology, wired up and ready to accept `/submit` calls. No relay/gateway
/// hop: central performs the outbound HTTP itself.
pub struct Topology {
    pub client_addr: String,
    pub http: reqwest::Client,
}

impl Topology {
    pub async fn build(
        upstream_count: usize,
        downstream_count: usize,
        chunk_size: usize,
        encryption_key: Option<&str>,
    ) -> Self {
        let central_addr = reserve_addr().await;
        let client_addr = reserve_addr().await;

        let mut upstream_addrs = Vec::new();
        for _ in 0..upstream_count {
            let addr = reserve_addr().await;
            let mut config = base_config();
            config.role = NodeRole::Upstream;
            config.upstream.listen_addr = addr.clone();
            config.upstream.central_addr = central_addr.clone();
            if let Some(key) = encryption_key {
                config.upstream.encryption = encryption(key);
            }
            spawn_role(config).await;
            upstream_addrs.push(addr);
        }

        let mut downstream_addrs = Vec::new();
        for _ in 0..downstream_count {
            let addr = reserve_addr().await;
            let mut config = base_config();
            config.role = NodeRole::Downstream;
            config.downstream.listen_addr = addr.clone();
            config.downstream.chunk_size = chunk_size;
            if let Some(key) = encryption_key {
                config.downstream.encryption = encryption(key);
            }
            spawn_role(config).await;
            downstream_addrs.push(addr);
        }

        let mut central_config = base_config();
        central_config.role = NodeRole::Central;
        central_config.central.listen_addr = central_addr.clone();
        central_config.central.downstreams = downstream_addrs;
        central_config.central.chunk_size = chunk_size;
        if let Some(key) = encryption_key {
            central_config.central.encryption = encryption(key);
        }
        spawn_role(central_config).await;

        let mut client_config = base_config();
        client_config.role = NodeRole::Client;
        client_config.client.listen_addr = client_addr.clone();
        client_config.client.upstreams = upstream_addrs;
        client_config.client.chunk_size = chunk_size;
        client_config.client.timeout_ms = 5_000;
        if let Some(key) = encryption_key {
            client_config.client.encryption = encryption(key);
        }
        spawn_role(client_config).await;

        // Give the freshly bound listeners a moment to start accepting.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        Topology {
            client_addr,
            http: reqwest::Client::new(),
        }
    }

    pub async fn submit(
        &self,
        method: &str,
        url: &str,
        body: Vec<u8>,
    ) -> shardnet_core::wire::OutboundResponse {
        let request = shardnet_core::wire::OutboundRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: HashMap::new(),
            body,
        };
        self.http
            .post(format!("http://{}/submit", self.client_addr))
            .json(&request)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

/// A minimal "Internet target" the gateway/central can issue outbound calls
/// against: echoes the request body back with a fixed status.
pub async fn spawn_echo_target() -> String {
    use axum::routing::any;
    use axum::Router;

    async fn echo(body: axum::body::Bytes) -> Vec<u8> {
        body.to_vec()
    }

    let addr = reserve_addr().await;
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    let app = Router::new().route("/", any(echo));
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    addr
}

/// A stand-in client endpoint that just records every chunk delivered to
/// `/chunk` instead of reassembling it, so a test can assert on exactly how
/// many deliveries a node made without wiring up a full `ClientState`.
pub async fn spawn_capture_target() -> (String, std::sync::Arc<tokio::sync::Mutex<Vec<shardnet_core::chunk::Chunk>>>) {
    use axum::extract::State;
    use axum::routing::post;
    use axum::Json;
    use axum::Router;

    let captured = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));

    async fn receive(
        State(captured): State<std::sync::Arc<tokio::sync::Mutex<Vec<shardnet_core::chunk::Chunk>>>>,
        Json(chunk): Json<shardnet_core::chunk::Chunk>,
    ) -> axum::http::StatusCode {
        captured.lock().await.push(chunk);
        axum::http::StatusCode::OK
    }

    let addr = reserve_addr().await;
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    let app = Router::new()
        .route("/chunk", post(receive))
        .with_state(captured.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    (addr, captured)
}
