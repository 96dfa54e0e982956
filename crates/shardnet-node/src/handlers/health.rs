use axum::extract::State;
use axum::Json;
use shardnet_core::wire::{HealthResponse, NodeRole};

/// Shared response builder. Each role still gets its own handler function
/// below, with its own state extractor, per the design note on per-node
/// router objects rather than one generic handler shared across roles.
pub fn health_response(role: NodeRole, pending_sessions: usize) -> Json<HealthResponse> {
    Json(HealthResponse {
        role,
        pending_sessions,
        timestamp: chrono::Utc::now(),
    })
}

pub async fn client_health(
    State(state): State<std::sync::Arc<crate::handlers::client::ClientState>>,
) -> Json<HealthResponse> {
    health_response(NodeRole::Client, state.pending.len())
}

pub async fn upstream_health(
    State(_state): State<std::sync::Arc<crate::handlers::upstream::UpstreamState>>,
) -> Json<HealthResponse> {
    health_response(NodeRole::Upstream, 0)
}

pub async fn central_health(
    State(state): State<std::sync::Arc<crate::handlers::central::CentralState>>,
) -> Json<HealthResponse> {
    health_response(NodeRole::Central, state.sessions.len())
}

pub async fn downstream_health(
    State(state): State<std::sync::Arc<crate::handlers::downstream::DownstreamState>>,
) -> Json<HealthResponse> {
    health_response(NodeRole::Downstream, state.sessions.len())
}

pub async fn relay_health(
    State(state): State<std::sync::Arc<crate::handlers::relay::RelayState>>,
) -> Json<HealthResponse> {
    let pending = state.buffer.len().await;
    health_response(NodeRole::Relay, pending)
}

pub async fn gateway_health(
    State(state): State<std::sync::Arc<crate::handlers::gateway::GatewayState>>,
) -> Json<HealthResponse> {
    health_response(NodeRole::Gateway, state.auth.registered_count())
}
