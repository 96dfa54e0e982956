//! Per-node router objects, one per role, rather than a single global mux.
//! Keeping these separate lets a test process spin up several nodes (any mix
//! of roles) against distinct listeners without them fighting over shared
//! route tables.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{central, client, downstream, gateway, health, relay, upstream};

fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn client_router(state: Arc<client::ClientState>) -> Router {
    Router::new()
        .route("/submit", post(client::submit))
        .route("/chunk", post(client::receive_chunk))
        .route("/health", get(health::client_health))
        .with_state(state)
        .layer(permissive_cors())
}

pub fn upstream_router(state: Arc<upstream::UpstreamState>) -> Router {
    Router::new()
        .route("/chunk", post(upstream::receive_chunk))
        .route("/health", get(health::upstream_health))
        .with_state(state)
        .layer(permissive_cors())
}

pub fn central_router(state: Arc<central::CentralState>) -> Router {
    Router::new()
        .route("/chunk", post(central::receive_chunk))
        .route("/relay-response", post(central::relay_response))
        .route("/health", get(health::central_health))
        .with_state(state)
        .layer(permissive_cors())
}

pub fn downstream_router(state: Arc<downstream::DownstreamState>) -> Router {
    Router::new()
        .route("/chunk", post(downstream::receive_chunk))
        .route("/health", get(health::downstream_health))
        .with_state(state)
        .layer(permissive_cors())
}

pub fn relay_router(state: Arc<relay::RelayState>) -> Router {
    Router::new()
        .route("/relay", post(relay::receive_relay))
        .route("/health", get(health::relay_health))
        .with_state(state)
        .layer(permissive_cors())
}

pub fn gateway_router(state: Arc<gateway::GatewayState>) -> Router {
    Router::new()
        .route("/register", post(gateway::register))
        .route("/proxy", post(gateway::proxy))
        .route("/health", get(health::gateway_health))
        .with_state(state)
        .layer(permissive_cors())
}
