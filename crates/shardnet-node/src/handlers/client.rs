//! Client role: accepts a request to proxy, fragments it across upstreams,
//! and waits for the reassembled response to arrive back at `/chunk`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use shardnet_core::chunk::{Chunk, SessionId};
use shardnet_core::config::ClientConfig;
use shardnet_core::crypto::{self, EncryptionKey};
use shardnet_core::wire::OutboundResponse;
use shardnet_services::dispatch::RoundRobin;
use shardnet_services::pending::{PendingResponse, PendingTable};
use shardnet_services::session::{accept_chunk, new_session_table, SessionTable};

pub struct ClientState {
    pub config: ClientConfig,
    pub sessions: SessionTable,
    pub pending: Arc<PendingTable>,
    pub dispatcher: RoundRobin,
    pub http: reqwest::Client,
}

impl ClientState {
    pub fn new(config: ClientConfig) -> Arc<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        Arc::new(Self {
            config,
            sessions: new_session_table(),
            pending: PendingTable::new(),
            dispatcher: RoundRobin::new(),
            http: shardnet_services::http_client::build_client(timeout),
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

/// `POST /submit` — the proxy's public entry point. Fragments the request
/// and round-robins its chunks across the configured upstreams, then blocks
/// until the matching response session completes or the client timeout
/// elapses.
pub async fn submit(
    State(state): State<Arc<ClientState>>,
    Json(request): Json<shardnet_core::wire::OutboundRequest>,
) -> Result<Json<OutboundResponse>, StatusCode> {
    if state.config.upstreams.is_empty() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let session_id = SessionId::generate();
    let timeout = Duration::from_millis(state.config.timeout_ms);
    let receiver = state.pending.register(session_id, timeout);

    let mut chunks = Chunk::fragment_request(
        session_id,
        &request.body,
        state.config.chunk_size,
        state.config.listen_addr.clone(),
        request.url,
        request.method,
        request.headers,
        chrono::Utc::now(),
    );

    if let Some(key) = state.key() {
        for chunk in &mut chunks {
            chunk.data = crypto::encrypt(&key, &chunk.data).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        }
    }

    for chunk in chunks {
        let target = state.dispatcher.next(&state.config.upstreams);
        let url = format!("http://{target}/chunk");
        if let Err(err) = shardnet_services::http_client::post_json_ok(&state.http, &url, &chunk).await {
            tracing::warn!(upstream = %target, error = %err, "failed to forward request chunk");
        }
    }

    match tokio::time::timeout(timeout, receiver).await {
        Ok(Ok(response)) => Ok(Json(OutboundResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })),
        _ => {
            state.pending.remove(session_id);
            Err(StatusCode::GATEWAY_TIMEOUT)
        }
    }
}

/// `POST /chunk` — a fragment of the reassembled response, forwarded here by
/// a downstream.
pub async fn receive_chunk(
    State(state): State<Arc<ClientState>>,
    Json(mut chunk): Json<Chunk>,
) -> StatusCode {
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

    let Some(body) = session.reassemble() else {
        tracing::error!(session = %session_id, "session reported complete but a chunk is missing");
        return StatusCode::INTERNAL_SERVER_ERROR;
    };
    let Some(meta) = session.any_chunk() else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    let response = PendingResponse {
        status: meta.status.unwrap_or(502),
        headers: meta.response_headers.clone().unwrap_or_else(HashMap::new),
        body,
    };
    state.pending.complete(session_id, response);
    StatusCode::OK
}
