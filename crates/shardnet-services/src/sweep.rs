//! Periodic eviction of sessions that never completed in time.

use std::time::Duration;

use shardnet_core::chunk::SessionId;

use crate::session::{SessionState, SessionTable};

/// Remove sessions whose last chunk arrived more than `timeout` ago and
/// that have not yet been dispatched. Returns the ids removed, so the
/// caller can log them.
pub fn sweep_expired(table: &SessionTable, timeout: Duration) -> Vec<SessionId> {
    let mut expired = Vec::new();
    table.retain(|id, session| {
        let stale =
            session.last_activity.elapsed() > timeout && session.state != SessionState::Dispatched;
        if stale {
            expired.push(*id);
        }
        !stale
    });
    expired
}

/// Run the sweep on a fixed interval until the process exits. Intended to be
/// spawned as a background task alongside the HTTP server.
pub async fn run_sweep_loop(table: SessionTable, timeout: Duration, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for id in sweep_expired(&table, timeout) {
            tracing::warn!(session = %id, "session timed out before completion, evicted");
        }
    }
}
