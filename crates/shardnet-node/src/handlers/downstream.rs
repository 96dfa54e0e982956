//! Downstream role: reassembles a response forwarded by Central and
//! delivers it directly to the client that originated the request, bypassing
//! the upstream it arrived through.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use shardnet_core::chunk::Chunk;
use shardnet_core::config::DownstreamConfig;
use shardnet_core::crypto::{self, EncryptionKey};
use shardnet_services::session::{accept_chunk, new_session_table, SessionTable};

pub struct DownstreamState {
    pub config: DownstreamConfig,
    pub sessions: SessionTable,
    pub http: reqwest::Client,
}

impl DownstreamState {
    pub fn new(config: DownstreamConfig) -> Arc<Self> {
        let timeout = Duration::from_secs(shardnet_core::wire::DEFAULT_OUTBOUND_TIMEOUT_SECS);
        Arc::new(Self {
            http: shardnet_services::http_client::build_client(timeout),
            sessions: new_session_table(),
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

/// `POST /chunk` — one fragment of a response, forwarded here by Central.
///
/// Once the session is complete the response is reassembled in full, then
/// re-fragmented and delivered to the client one chunk at a time rather than
/// as a single reassembled body. This mirrors every other inter-node hop in
/// the pipeline, which always exchanges chunks rather than whole payloads.
pub async fn receive_chunk(
    State(state): State<Arc<DownstreamState>>,
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

    let (Some(body), Some(meta)) = (session.reassemble(), session.any_chunk().cloned()) else {
        tracing::error!(session = %session_id, "response session complete but missing a chunk");
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    let mut out_chunks = Chunk::fragment_response(
        session_id,
        &body,
        state.config.chunk_size,
        meta.source_client.clone(),
        meta.status.unwrap_or(502),
        meta.response_headers.clone().unwrap_or_default(),
        chrono::Utc::now(),
    );

    if let Some(key) = state.key() {
        for c in &mut out_chunks {
            match crypto::encrypt(&key, &c.data) {
                Ok(ciphertext) => c.data = ciphertext,
                Err(err) => {
                    tracing::error!(session = %session_id, error = %err, "failed to encrypt chunk for client delivery");
                    return StatusCode::INTERNAL_SERVER_ERROR;
                }
            }
        }
    }

    let url = format!("http://{}/chunk", meta.source_client);
    for c in out_chunks {
        if let Err(err) = shardnet_services::http_client::post_json_ok(&state.http, &url, &c).await {
            tracing::warn!(client = %meta.source_client, error = %err, "failed to deliver response chunk to client");
        }
    }

    StatusCode::OK
}
