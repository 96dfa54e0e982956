//! Relay role: buffers forwarded requests for batched, optionally shuffled
//! delivery, and rotates which configured next hop receives them.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use shardnet_core::auth::AuthToken;
use shardnet_core::config::RelayConfig;
use shardnet_core::wire::{RegisterRequest, RegisterResponse, RelayEnvelope, RelayResponseNotification};
use shardnet_services::relay::{HopRotation, MixBuffer};
use tokio::sync::RwLock;

pub struct RelayState {
    pub config: RelayConfig,
    pub buffer: MixBuffer<RelayEnvelope>,
    pub rotation: HopRotation,
    pub gateway_token: RwLock<Option<AuthToken>>,
    pub http: reqwest::Client,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Arc<Self> {
        let timeout = Duration::from_secs(shardnet_core::wire::DEFAULT_OUTBOUND_TIMEOUT_SECS);
        let rotation = HopRotation::new(config.rotation_period_secs);
        Arc::new(Self {
            rotation,
            buffer: MixBuffer::new(),
            gateway_token: RwLock::new(None),
            http: shardnet_services::http_client::build_client(timeout),
            config,
        })
    }
}

/// Register with the configured gateway, exchanging `gateway_secret` for a
/// bearer token. Called once at startup; a relay with no `gateway_url`
/// configured (an interior hop in the chain) skips this entirely.
pub async fn register_with_gateway(state: &RelayState) {
    let (Some(gateway_url), Some(secret)) = (&state.config.gateway_url, &state.config.gateway_secret)
    else {
        return;
    };

    let request = RegisterRequest {
        node_id: state.config.node_id.clone(),
        secret: secret.clone(),
    };
    let url = format!("{gateway_url}/register");
    match shardnet_services::http_client::post_json::<_, RegisterResponse>(&state.http, &url, &request)
        .await
    {
        Ok(response) => {
            tracing::info!(node_id = %state.config.node_id, "registered with gateway");
            *state.gateway_token.write().await = Some(AuthToken::from_str(response.token));
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to register with gateway");
        }
    }
}

/// `POST /relay` — with mixing disabled, forward immediately and respond
/// with the outcome; with mixing enabled, buffer for the next flush and
/// respond 202 without waiting on delivery.
pub async fn receive_relay(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Json(envelope): Json<RelayEnvelope>,
) -> StatusCode {
    if let Some(from_node) = headers
        .get(shardnet_core::wire::HEADER_FROM_NODE)
        .and_then(|v| v.to_str().ok())
    {
        let request_id = headers
            .get(shardnet_core::wire::HEADER_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        tracing::debug!(from_node = %from_node, request_id = %request_id, session = %envelope.session_id, "envelope received from prior hop");
    }

    if state.config.mixing {
        state.buffer.push(envelope).await;
        return StatusCode::ACCEPTED;
    }
    forward_one(&state, envelope).await;
    StatusCode::OK
}

/// Drain the buffer on a fixed interval and forward each envelope along
/// (batched, and shuffled if `mixing` is enabled). Runs until the process
/// exits.
pub async fn run_flush_loop(state: Arc<RelayState>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(state.config.flush_interval_secs));
    loop {
        ticker.tick().await;
        let batch = state.buffer.drain(state.config.mixing).await;
        for envelope in batch {
            forward_one(&state, envelope).await;
        }
    }
}

/// Tag one outbound hop with the relay boundary's tracing headers: this
/// relay's own node id and a fresh correlation id for the hop.
fn tag_hop(state: &RelayState, request_id: &str) -> [(&'static str, String); 2] {
    [
        (shardnet_core::wire::HEADER_FROM_NODE, state.config.node_id.clone()),
        (shardnet_core::wire::HEADER_REQUEST_ID, request_id.to_string()),
    ]
}

async fn forward_one(state: &RelayState, envelope: RelayEnvelope) {
    let request_id = format!("{:016x}", rand::random::<u64>());

    if let Some(next_hop) = state.rotation.current_hop(&state.config.next_hops) {
        let url = format!("http://{next_hop}/relay");
        let mut builder = state.http.post(&url);
        for (name, value) in tag_hop(state, &request_id) {
            builder = builder.header(name, value);
        }
        let result = builder.json(&envelope).send().await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(next_hop = %next_hop, status = %resp.status(), "next relay rejected forwarded envelope");
            }
            Err(err) => {
                tracing::warn!(next_hop = %next_hop, error = %err, "failed to forward envelope to next relay");
            }
            Ok(_) => {}
        }
        return;
    }

    let Some(gateway_url) = &state.config.gateway_url else {
        tracing::error!(session = %envelope.session_id, "relay has no next hop and no gateway configured");
        return;
    };
    let token = state.gateway_token.read().await.clone();
    let Some(token) = token else {
        tracing::error!("relay has not registered with its gateway yet, dropping envelope");
        return;
    };

    let url = format!("{gateway_url}/proxy");
    let mut builder = state
        .http
        .post(&url)
        .header(shardnet_core::wire::HEADER_NODE_ID, &state.config.node_id)
        .header(shardnet_core::wire::HEADER_AUTH_TOKEN, token.as_str());
    for (name, value) in tag_hop(state, &request_id) {
        builder = builder.header(name, value);
    }
    let result = builder.json(&envelope.outbound).send().await;

    let response = match result {
        Ok(resp) => match resp.error_for_status() {
            Ok(resp) => match resp.json::<shardnet_core::wire::OutboundResponse>().await {
                Ok(r) => r,
                Err(err) => {
                    tracing::error!(error = %err, "gateway returned an unparseable response");
                    return;
                }
            },
            Err(err) => {
                tracing::error!(error = %err, "gateway rejected proxy request");
                return;
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "failed to reach gateway");
            return;
        }
    };

    let notification = RelayResponseNotification {
        session_id: envelope.session_id,
        response,
    };
    let callback_url = format!("http://{}/relay-response", envelope.callback_addr);
    if let Err(err) =
        shardnet_services::http_client::post_json_ok(&state.http, &callback_url, &notification).await
    {
        tracing::warn!(callback = %envelope.callback_addr, error = %err, "failed to deliver relay response to central");
    }
}
