//! Wire-level constants shared by every node role: header names, default
//! timeouts, and the `/health` response shape.

use serde::{Deserialize, Serialize};

/// Inter-node header carrying the sending node's identity at the gateway
/// boundary.
pub const HEADER_NODE_ID: &str = "X-Node-ID";
/// Inter-node header carrying the gateway bearer token.
pub const HEADER_AUTH_TOKEN: &str = "X-Auth-Token";
/// Obfuscation header: a correlation id for one forwarded hop, set fresh at
/// every hop (upstream's forward to central, and each relay-to-relay or
/// relay-to-gateway forward).
pub const HEADER_REQUEST_ID: &str = "X-Request-ID";
/// Obfuscation header: the node that forwarded this payload on this hop.
pub const HEADER_FROM_NODE: &str = "X-From-Node";

/// Headers stripped from a reassembled request before issuing it to the
/// eventual target. These are protocol plumbing, not part of the original
/// client request.
pub const STRIPPED_HEADERS: &[&str] = &[HEADER_NODE_ID, HEADER_AUTH_TOKEN];

/// Default per-session reassembly timeout at Central and Downstream.
pub const DEFAULT_REASSEMBLY_TIMEOUT_SECS: u64 = 60;
/// Interval at which the periodic sweep scans for timed-out sessions.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
/// Default outbound HTTP request timeout.
pub const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 30;
/// Default client-side end-to-end request timeout.
pub const DEFAULT_CLIENT_TIMEOUT_MS: u64 = 30_000;
/// Nominal relay mixing-buffer flush interval.
pub const DEFAULT_RELAY_FLUSH_SECS: u64 = 3;
/// Gateway mixing-batch drain interval.
pub const DEFAULT_GATEWAY_BATCH_SECS: u64 = 5;

/// The role a node plays in the fragmentation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Client,
    Upstream,
    Central,
    Downstream,
    Relay,
    Gateway,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeRole::Client => "client",
            NodeRole::Upstream => "upstream",
            NodeRole::Central => "central",
            NodeRole::Downstream => "downstream",
            NodeRole::Relay => "relay",
            NodeRole::Gateway => "gateway",
        };
        write!(f, "{s}")
    }
}

/// `GET /health` response shared by every role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub role: NodeRole,
    /// Pending/active session count, meaning varies by role (client: pending
    /// requests awaiting reassembly; central/downstream: in-flight sessions).
    pub pending_sessions: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// The reassembled request a client originally issued, handed from Central
/// to a relay chain (or straight to the gateway) for outbound delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(with = "crate::chunk::base64_payload")]
    pub body: Vec<u8>,
}

/// The outcome of issuing an [`OutboundRequest`], carried back through the
/// relay chain to Central.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(with = "crate::chunk::base64_payload")]
    pub body: Vec<u8>,
}

/// `POST /register` request: a relay proving knowledge of its shared secret
/// to obtain a bearer token for `/proxy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub node_id: String,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub node_id: String,
    pub token: String,
}

/// What travels hop-to-hop along a relay chain: the outbound request plus
/// where to deliver the eventual response. `callback_addr` is carried
/// unchanged through every hop so the terminus (gateway or last relay) can
/// reach back to Central directly, the same way Downstream reaches the
/// client directly rather than retracing the forward path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub session_id: crate::chunk::SessionId,
    pub outbound: OutboundRequest,
    pub callback_addr: String,
}

/// Delivered to `callback_addr` once the outbound call completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayResponseNotification {
    pub session_id: crate::chunk::SessionId,
    pub response: OutboundResponse,
}
