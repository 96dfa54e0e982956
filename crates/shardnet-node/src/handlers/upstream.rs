//! Upstream role: the first hop after the client. Forwards each request
//! chunk on to Central, decrypting and re-encrypting it so the ciphertext
//! does not correlate byte-for-byte across the hop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rand::Rng;
use shardnet_core::chunk::Chunk;
use shardnet_core::config::UpstreamConfig;
use shardnet_core::crypto::{self, EncryptionKey};

pub struct UpstreamState {
    pub config: UpstreamConfig,
    pub http: reqwest::Client,
}

impl UpstreamState {
    pub fn new(config: UpstreamConfig) -> Arc<Self> {
        let timeout = Duration::from_secs(shardnet_core::wire::DEFAULT_OUTBOUND_TIMEOUT_SECS);
        Arc::new(Self {
            http: shardnet_services::http_client::build_client(timeout),
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

/// `POST /chunk` — one fragment of a request, forwarded on to Central.
///
/// Tags the forward with `X-From-Node` (this upstream's own listen address)
/// and `X-Request-ID` (a fresh correlation id for this one hop) — the same
/// relay-boundary headers a relay chain uses to trace one forwarded chunk
/// across hops, applied here at the client's own first hop.
pub async fn receive_chunk(State(state): State<Arc<UpstreamState>>, Json(mut chunk): Json<Chunk>) -> StatusCode {
    if let Some(key) = state.key() {
        let plain = match crypto::decrypt(&key, &chunk.data) {
            Ok(p) => p,
            Err(_) => return StatusCode::BAD_REQUEST,
        };
        chunk.data = match crypto::encrypt(&key, &plain) {
            Ok(c) => c,
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR,
        };
    }

    if state.config.jitter_max_ms > 0 {
        let delay_ms = rand::thread_rng().gen_range(0..=state.config.jitter_max_ms);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    let request_id = format!("{:016x}", rand::random::<u64>());
    let url = format!("http://{}/chunk", state.config.central_addr);
    let result = state
        .http
        .post(&url)
        .header(shardnet_core::wire::HEADER_FROM_NODE, state.config.listen_addr.as_str())
        .header(shardnet_core::wire::HEADER_REQUEST_ID, request_id.as_str())
        .json(&chunk)
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => StatusCode::OK,
        Ok(resp) => {
            tracing::warn!(central = %state.config.central_addr, status = %resp.status(), "central rejected forwarded chunk");
            StatusCode::BAD_GATEWAY
        }
        Err(err) => {
            tracing::warn!(central = %state.config.central_addr, error = %err, "failed to forward chunk to central");
            StatusCode::BAD_GATEWAY
        }
    }
}
