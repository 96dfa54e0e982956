//! Client-side bookkeeping for requests awaiting their response.
//!
//! A client dispatches request chunks to its upstreams and then waits for
//! the response to arrive back at its own `/chunk` endpoint, fully
//! reassembled, addressed by the session id it generated. This table bridges
//! that gap: the HTTP handler that completes a session wakes the task
//! blocked on the original request via a oneshot channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use shardnet_core::chunk::SessionId;
use tokio::sync::oneshot;

pub struct PendingResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

struct PendingEntry {
    sender: oneshot::Sender<PendingResponse>,
    deadline: Instant,
}

/// Sessions a client is waiting on, keyed by the session id it generated for
/// the outbound request.
pub struct PendingTable {
    inner: DashMap<SessionId, PendingEntry>,
}

impl PendingTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: DashMap::new(),
        })
    }

    /// Register a session awaiting a response. The returned receiver
    /// resolves once [`complete`](Self::complete) is called, or is dropped
    /// (Err) once the entry is swept past its deadline.
    pub fn register(
        &self,
        session_id: SessionId,
        timeout: Duration,
    ) -> oneshot::Receiver<PendingResponse> {
        let (sender, receiver) = oneshot::channel();
        self.inner.insert(
            session_id,
            PendingEntry {
                sender,
                deadline: Instant::now() + timeout,
            },
        );
        receiver
    }

    /// Deliver the reassembled response to whoever is waiting on
    /// `session_id`. Returns `false` if nobody was waiting: either the
    /// session id is unknown, or it was already swept out as expired.
    pub fn complete(&self, session_id: SessionId, response: PendingResponse) -> bool {
        match self.inner.remove(&session_id) {
            Some((_, entry)) => entry.sender.send(response).is_ok(),
            None => false,
        }
    }

    /// Drop a single entry without completing it, e.g. after the waiting
    /// caller gave up on its own local timeout.
    pub fn remove(&self, session_id: SessionId) {
        self.inner.remove(&session_id);
    }

    /// Drop entries past their deadline. The corresponding receivers observe
    /// a closed channel and the waiting task should treat that as a timeout.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.deadline > now);
        before - self.inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}
