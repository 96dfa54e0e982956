//! Chunk, the protocol's wire unit.
//!
//! A chunk carries one fragment of a request or response body plus the
//! session metadata needed to reassemble it and, for request chunks, the
//! addressing needed to route the eventual response back to the client.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A session identifier: 16 random bytes, always carried on the wire as
/// 32 lowercase hex characters.
///
/// Always rendered as hex on the wire, never as raw bytes cast to a string
/// (non-printable, unstable across encodings) — this is the only form the
/// rest of the protocol assumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; 16]);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ChunkError> {
        let bytes = hex::decode(s).map_err(|_| ChunkError::BadSessionId)?;
        if bytes.len() != 16 {
            return Err(ChunkError::BadSessionId);
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SessionId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Base64 (de)serialization for the chunk payload, matching the wire format's
/// `data` field (base64 bytes). Shared with [`crate::wire`] for the
/// reassembled-request/response envelopes exchanged with the gateway.
pub(crate) mod base64_payload {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }
}

/// The protocol's wire unit: a fragment of a request or response body.
///
/// Request metadata (`target_url`, `method`, `headers`) travels on every
/// chunk of a request session so that reassembly at any node knows where to
/// send the eventual outbound call. Response chunks instead carry `status`
/// and `response_headers`, populated once the outbound call completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub session_id: SessionId,
    pub sequence_num: u32,
    pub total_chunks: u32,
    #[serde(with = "base64_payload")]
    pub data: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    /// `host:port` the downstream must deliver the response to.
    pub source_client: String,
    pub target_url: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub status: Option<u16>,
    pub response_headers: Option<HashMap<String, String>>,
}

impl Chunk {
    /// Split `body` into chunks of at most `chunk_size` bytes.
    ///
    /// An empty body still produces exactly one chunk with a zero-length
    /// payload. `total_chunks` is `ceil(body.len() / chunk_size)`, minimum 1.
    #[allow(clippy::too_many_arguments)]
    pub fn fragment_request(
        session_id: SessionId,
        body: &[u8],
        chunk_size: usize,
        source_client: String,
        target_url: String,
        method: String,
        headers: HashMap<String, String>,
        timestamp: DateTime<Utc>,
    ) -> Vec<Chunk> {
        let total = total_chunks(body.len(), chunk_size);
        (0..total)
            .map(|i| {
                let start = i * chunk_size;
                let end = ((i + 1) * chunk_size).min(body.len());
                Chunk {
                    session_id,
                    sequence_num: (i + 1) as u32,
                    total_chunks: total as u32,
                    data: body[start..end].to_vec(),
                    timestamp,
                    source_client: source_client.clone(),
                    target_url: Some(target_url.clone()),
                    method: Some(method.clone()),
                    headers: headers.clone(),
                    status: None,
                    response_headers: None,
                }
            })
            .collect()
    }

    /// Split a response body into chunks, carrying the source-client address
    /// forward from the request session so downstreams know where to deliver.
    pub fn fragment_response(
        session_id: SessionId,
        body: &[u8],
        chunk_size: usize,
        source_client: String,
        status: u16,
        response_headers: HashMap<String, String>,
        timestamp: DateTime<Utc>,
    ) -> Vec<Chunk> {
        let total = total_chunks(body.len(), chunk_size);
        (0..total)
            .map(|i| {
                let start = i * chunk_size;
                let end = ((i + 1) * chunk_size).min(body.len());
                Chunk {
                    session_id,
                    sequence_num: (i + 1) as u32,
                    total_chunks: total as u32,
                    data: body[start..end].to_vec(),
                    timestamp,
                    source_client: source_client.clone(),
                    target_url: None,
                    method: None,
                    headers: HashMap::new(),
                    status: Some(status),
                    response_headers: Some(response_headers.clone()),
                }
            })
            .collect()
    }
}

/// `ceil(len / chunk_size)`, minimum 1. An empty body still yields one chunk.
pub fn total_chunks(len: usize, chunk_size: usize) -> usize {
    if len == 0 {
        return 1;
    }
    len.div_ceil(chunk_size)
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("session id must be 32 hex characters")]
    BadSessionId,
}
