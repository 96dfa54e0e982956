//! Wires a loaded [`ShardnetConfig`] into a concrete role: state, router, and
//! whatever background tasks that role needs (reassembly sweeps, relay
//! flush, gateway registration).

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use shardnet_core::config::ShardnetConfig;
use shardnet_core::wire::NodeRole;
use tokio::task::JoinSet;

use crate::handlers::{central, client, downstream, gateway, relay, upstream};
use crate::router;

/// What it takes to serve one role: the address to bind, its router, and the
/// background tasks to spawn alongside the HTTP server.
pub struct RoleRuntime {
    pub listen_addr: String,
    pub router: Router,
    pub tasks: JoinSet<()>,
}

pub fn build(config: ShardnetConfig) -> RoleRuntime {
    match config.role {
        NodeRole::Client => {
            let state = client::ClientState::new(config.client);
            RoleRuntime {
                listen_addr: state.config.listen_addr.clone(),
                router: router::client_router(state),
                tasks: JoinSet::new(),
            }
        }
        NodeRole::Upstream => {
            let state = upstream::UpstreamState::new(config.upstream);
            RoleRuntime {
                listen_addr: state.config.listen_addr.clone(),
                router: router::upstream_router(state),
                tasks: JoinSet::new(),
            }
        }
        NodeRole::Central => {
            let state = central::CentralState::new(config.central);
            let mut tasks = JoinSet::new();
            tasks.spawn(shardnet_services::sweep::run_sweep_loop(
                state.sessions.clone(),
                Duration::from_secs(state.config.reassembly_timeout_secs),
                Duration::from_secs(state.config.sweep_interval_secs),
            ));
            RoleRuntime {
                listen_addr: state.config.listen_addr.clone(),
                router: router::central_router(state),
                tasks,
            }
        }
        NodeRole::Downstream => {
            let state = downstream::DownstreamState::new(config.downstream);
            let mut tasks = JoinSet::new();
            tasks.spawn(shardnet_services::sweep::run_sweep_loop(
                state.sessions.clone(),
                Duration::from_secs(state.config.reassembly_timeout_secs),
                Duration::from_secs(state.config.sweep_interval_secs),
            ));
            RoleRuntime {
                listen_addr: state.config.listen_addr.clone(),
                router: router::downstream_router(state),
                tasks,
            }
        }
        NodeRole::Relay => {
            let state = relay::RelayState::new(config.relay);
            let mut tasks = JoinSet::new();
            {
                let state = state.clone();
                tasks.spawn(async move {
                    relay::register_with_gateway(&state).await;
                });
            }
            tasks.spawn(relay::run_flush_loop(state.clone()));
            RoleRuntime {
                listen_addr: state.config.listen_addr.clone(),
                router: router::relay_router(state),
                tasks,
            }
        }
        NodeRole::Gateway => {
            let state = gateway::GatewayState::new(config.gateway);
            let mut tasks = JoinSet::new();
            tasks.spawn(gateway::run_batch_loop(state.clone()));
            RoleRuntime {
                listen_addr: state.config.listen_addr.clone(),
                router: router::gateway_router(state),
                tasks,
            }
        }
    }
}
