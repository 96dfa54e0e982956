//! Gateway role: the only node that ever sees a plaintext destination URL.
//! Authenticates callers via [`AuthRegistry`], optionally buffers requests
//! for batched delivery, and issues the actual outbound HTTP call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use shardnet_core::config::GatewayConfig;
use shardnet_core::wire::{
    OutboundRequest, OutboundResponse, RegisterRequest, RegisterResponse, HEADER_AUTH_TOKEN,
    HEADER_NODE_ID,
};
use shardnet_services::gateway::AuthRegistry;
use shardnet_services::relay::MixBuffer;

pub struct GatewayState {
    pub config: GatewayConfig,
    pub auth: AuthRegistry,
    pub http: reqwest::Client,
    pub buffer: MixBuffer<OutboundRequest>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Arc<Self> {
        let timeout = Duration::from_secs(config.outbound_timeout_secs);
        Arc::new(Self {
            auth: AuthRegistry::new(config.node_secrets.clone()),
            http: shardnet_services::http_client::build_client(timeout),
            buffer: MixBuffer::new(),
            config,
        })
    }
}

/// `POST /register` — exchange a node's shared secret for a bearer token.
pub async fn register(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, StatusCode> {
    match state.auth.register(&request.node_id, &request.secret) {
        Some(token) => Ok(Json(RegisterResponse {
            node_id: request.node_id,
            token: token.as_str().to_string(),
        })),
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

fn authenticate(state: &GatewayState, headers: &HeaderMap) -> bool {
    let node_id = headers
        .get(HEADER_NODE_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let token = headers
        .get(HEADER_AUTH_TOKEN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    state.auth.verify(node_id, token)
}

/// `POST /proxy` — issue the final outbound request on behalf of an
/// authenticated relay. With mixing disabled (the default) this applies
/// uniform jitter and issues the call inline, returning 200 with the
/// response body. With mixing enabled, the request is queued for the next
/// batch tick instead: the call answers 202 immediately and the outbound
/// HTTP happens later, in parallel with the rest of that batch, the same
/// way the relay's own mixing buffer defers forwarding.
pub async fn proxy(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(request): Json<OutboundRequest>,
) -> Result<Json<OutboundResponse>, StatusCode> {
    if !authenticate(&state, &headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    if state.config.mixing {
        state.buffer.push(request).await;
        return Err(StatusCode::ACCEPTED);
    }

    if state.config.jitter_ms > 0 {
        let delay_ms = rand::random::<u64>() % state.config.jitter_ms.max(1);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(Json(issue(&state.http, &request).await))
}

/// Drain the mixing buffer on a fixed interval and issue every queued
/// request in parallel. Runs until the process exits; a no-op tick when
/// mixing is disabled, since nothing is ever pushed to the buffer then.
pub async fn run_batch_loop(state: Arc<GatewayState>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(state.config.batch_interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let batch = state.buffer.drain(false).await;
        if batch.is_empty() {
            continue;
        }
        let mut handles = Vec::with_capacity(batch.len());
        for request in batch {
            let http = state.http.clone();
            handles.push(tokio::spawn(async move {
                issue(&http, &request).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn issue(http: &reqwest::Client, request: &OutboundRequest) -> OutboundResponse {
    let method = request
        .method
        .parse::<reqwest::Method>()
        .unwrap_or(reqwest::Method::GET);
    let mut builder = http
        .request(method, request.url.as_str())
        .body(request.body.clone());
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }

    match builder.send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect::<HashMap<_, _>>();
            let body = resp.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            OutboundResponse {
                status,
                headers,
                body,
            }
        }
        Err(err) => {
            tracing::warn!(url = %request.url, error = %err, "gateway outbound request failed");
            OutboundResponse {
                status: 502,
                headers: HashMap::new(),
                body: format!("gateway fetch failed: {err}").into_bytes(),
            }
        }
    }
}
