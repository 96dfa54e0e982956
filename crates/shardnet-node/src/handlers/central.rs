//! Central role: reassembles a fragmented request, issues it (directly or
//! through a relay chain), and fragments the response back out to the
//! downstreams.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use dashmap::DashMap;
use shardnet_core::chunk::{Chunk, SessionId};
use shardnet_core::config::CentralConfig;
use shardnet_core::crypto::{self, EncryptionKey};
use shardnet_core::wire::{
    OutboundRequest, RelayEnvelope, RelayResponseNotification, HEADER_FROM_NODE, HEADER_REQUEST_ID,
    STRIPPED_HEADERS,
};
use shardnet_services::dispatch::RoundRobin;
use shardnet_services::session::{accept_chunk, new_session_table, SessionTable};

pub struct CentralState {
    pub config: CentralConfig,
    pub sessions: SessionTable,
    /// Source-client address for sessions dispatched through a relay chain,
    /// kept until the `/relay-response` callback arrives.
    pub awaiting_relay: DashMap<SessionId, String>,
    pub dispatcher: RoundRobin,
    pub http: reqwest::Client,
}

impl CentralState {
    pub fn new(config: CentralConfig) -> Arc<Self> {
        let timeout = Duration::from_secs(config.outbound_timeout_secs);
        Arc::new(Self {
            http: shardnet_services::http_client::build_client(timeout),
            sessions: new_session_table(),
            awaiting_relay: DashMap::new(),
            dispatcher: RoundRobin::new(),
            config,
        })
    }

    fn key(&self) -> Option<EncryptionKey> {
        if !self.config.encryption.enabled {
            return None;
        }
        self.config
            .encryption
            .key_hex
            .as_deref()
            .and_then(|h| EncryptionKey::from_hex(h).ok())
    }
}

/// `POST /chunk` — one fragment of a request, forwarded here by an upstream.
pub async fn receive_chunk(
    State(state): State<Arc<CentralState>>,
    headers: HeaderMap,
    Json(mut chunk): Json<Chunk>,
) -> StatusCode {
    if let Some(from_node) = headers.get(HEADER_FROM_NODE).and_then(|v| v.to_str().ok()) {
        let request_id = headers
            .get(HEADER_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        tracing::debug!(from_node = %from_node, request_id = %request_id, session = %chunk.session_id, "chunk forwarded by upstream");
    }

    if let Some(key) = state.key() {
        match crypto::decrypt(&key, &chunk.data) {
            Ok(plain) => chunk.data = plain,
            Err(_) => return StatusCode::BAD_REQUEST,
        }
    }

    let session_id = chunk.session_id;
    if !accept_chunk(&state.sessions, chunk) {
        return StatusCode::ACCEPTED;
    }

    let Some((_, mut session)) = state.sessions.remove(&session_id) else {
        return StatusCode::ACCEPTED;
    };
    session.mark_dispatched();

    let (Some(body), Some(meta)) = (session.reassemble(), session.any_chunk().cloned()) else {
        tracing::error!(session = %session_id, "request session complete but missing a chunk");
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    let mut headers = meta.headers.clone();
    for stripped in STRIPPED_HEADERS {
        headers.remove(*stripped);
    }
    let outbound = OutboundRequest {
        method: meta.method.clone().unwrap_or_else(|| "GET".to_string()),
        url: meta.target_url.clone().unwrap_or_default(),
        headers,
        body,
    };

    match &state.config.relay_addr {
        Some(relay_addr) => {
            state
                .awaiting_relay
                .insert(session_id, meta.source_client.clone());
            let envelope = RelayEnvelope {
                session_id,
                outbound,
                callback_addr: state.config.listen_addr.clone(),
            };
            let url = format!("http://{relay_addr}/relay");
            if let Err(err) =
                shardnet_services::http_client::post_json_ok(&state.http, &url, &envelope).await
            {
                tracing::warn!(relay = %relay_addr, error = %err, "failed to hand request off to relay chain");
                state.awaiting_relay.remove(&session_id);
                return StatusCode::BAD_GATEWAY;
            }
            StatusCode::ACCEPTED
        }
        None => {
            let response = issue_outbound(&state.http, &outbound).await;
            deliver_response(&state, session_id, &meta.source_client, response).await;
            StatusCode::OK
        }
    }
}

/// `POST /relay-response` — the outbound call's result, handed back by the
/// terminus of the relay chain (or the gateway) for a session dispatched via
/// [`receive_chunk`]'s relay path.
pub async fn relay_response(
    State(state): State<Arc<CentralState>>,
    Json(notification): Json<RelayResponseNotification>,
) -> StatusCode {
    let Some((_, source_client)) = state.awaiting_relay.remove(&notification.session_id) else {
        return StatusCode::NOT_FOUND;
    };
    deliver_response(
        &state,
        notification.session_id,
        &source_client,
        shardnet_core::wire::OutboundResponse {
            status: notification.response.status,
            headers: notification.response.headers,
            body: notification.response.body,
        },
    )
    .await;
    StatusCode::OK
}

async fn issue_outbound(
    http: &reqwest::Client,
    request: &OutboundRequest,
) -> shardnet_core::wire::OutboundResponse {
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
            shardnet_core::wire::OutboundResponse {
                status,
                headers,
                body,
            }
        }
        Err(err) => {
            tracing::warn!(url = %request.url, error = %err, "outbound request failed");
            shardnet_core::wire::OutboundResponse {
                status: 502,
                headers: HashMap::new(),
                body: format!("upstream fetch failed: {err}").into_bytes(),
            }
        }
    }
}

async fn deliver_response(
    state: &CentralState,
    session_id: SessionId,
    source_client: &str,
    response: shardnet_core::wire::OutboundResponse,
) {
    if state.config.downstreams.is_empty() {
        tracing::warn!(session = %session_id, "no downstreams configured, response dropped");
        return;
    }

    let mut chunks = Chunk::fragment_response(
        session_id,
        &response.body,
        state.config.chunk_size,
        source_client.to_string(),
        response.status,
        response.headers,
        chrono::Utc::now(),
    );

    if let Some(key) = state.key() {
        for chunk in &mut chunks {
            match crypto::encrypt(&key, &chunk.data) {
                Ok(ciphertext) => chunk.data = ciphertext,
                Err(err) => {
                    tracing::error!(session = %session_id, error = %err, "failed to encrypt response chunk");
                    return;
                }
            }
        }
    }

    for chunk in chunks {
        let target = state.dispatcher.next(&state.config.downstreams);
        let url = format!("http://{target}/chunk");
        if let Err(err) = shardnet_services::http_client::post_json_ok(&state.http, &url, &chunk).await {
            tracing::warn!(downstream = %target, error = %err, "failed to forward response chunk");
        }
    }
}
