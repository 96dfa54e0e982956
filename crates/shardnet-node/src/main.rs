//! shardnet-node — a single node in the fragmentation pipeline, running
//! whichever role its configuration names.

use anyhow::{Context, Result};
use shardnet_node::role;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing. RUST_LOG controls verbosity, e.g.
    // RUST_LOG=debug cargo run -p shardnet-node
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = shardnet_core::config::ShardnetConfig::load().context("loading configuration")?;
    tracing::info!(role = %config.role, "shardnet-node starting");

    let mut runtime = role::build(config);
    let listener = tokio::net::TcpListener::bind(&runtime.listen_addr)
        .await
        .with_context(|| format!("binding {}", runtime.listen_addr))?;
    tracing::info!(addr = %runtime.listen_addr, "listening");

    let server_task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, runtime.router).await {
            tracing::error!(error = %err, "server exited");
        }
    });

    if runtime.tasks.is_empty() {
        let r = server_task.await;
        tracing::error!("server task exited: {:?}", r);
        return Ok(());
    }

    // Wait for the server or any background task to exit; they all run
    // forever, so this only fires on a panic or an unrecoverable error.
    tokio::select! {
        r = server_task => tracing::error!("server task exited: {:?}", r),
        r = runtime.tasks.join_next() => tracing::error!("background task exited: {:?}", r),
    }

    Ok(())
}
