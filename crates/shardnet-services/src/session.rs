//! Session reassembly — tracks chunks arriving for a session until every
//! sequence number has been seen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use shardnet_core::chunk::{Chunk, SessionId};

/// EMPTY -> PARTIAL -> COMPLETE -> DISPATCHED. A session never regresses;
/// `DISPATCHED` marks it as already handed off so the sweep leaves it alone
/// until the caller removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Partial,
    Complete,
    Dispatched,
}

pub struct ReassemblySession {
    pub total_chunks: u32,
    pub chunks: HashMap<u32, Chunk>,
    pub state: SessionState,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl ReassemblySession {
    fn new(total_chunks: u32) -> Self {
        let now = Instant::now();
        Self {
            total_chunks,
            chunks: HashMap::new(),
            state: SessionState::Empty,
            created_at: now,
            last_activity: now,
        }
    }

    /// Insert a chunk, replacing any earlier chunk with the same sequence
    /// number. Re-delivery of a chunk is idempotent: the state only ever
    /// moves forward, never resets.
    pub fn insert(&mut self, chunk: Chunk) {
        self.last_activity = Instant::now();
        self.chunks.insert(chunk.sequence_num, chunk);
        if self.chunks.len() as u32 >= self.total_chunks {
            self.state = SessionState::Complete;
        } else {
            self.state = SessionState::Partial;
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, SessionState::Complete)
    }

    /// Concatenate chunk payloads in sequence order. Returns `None` if a
    /// sequence number is missing — this should never happen once
    /// [`is_complete`](Self::is_complete) is true, since completeness is
    /// defined by having `total_chunks` distinct sequence numbers present.
    pub fn reassemble(&self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        for seq in 1..=self.total_chunks {
            out.extend_from_slice(&self.chunks.get(&seq)?.data);
        }
        Some(out)
    }

    /// Any one chunk of the session, used to read request/response metadata
    /// that is identical across all chunks of a session.
    pub fn any_chunk(&self) -> Option<&Chunk> {
        self.chunks.values().next()
    }

    pub fn mark_dispatched(&mut self) {
        self.state = SessionState::Dispatched;
    }
}

/// The shared reassembly table, keyed by session id.
pub type SessionTable = Arc<DashMap<SessionId, ReassemblySession>>;

pub fn new_session_table() -> SessionTable {
    Arc::new(DashMap::new())
}

/// Insert a chunk into the table, creating the session entry on first
/// arrival. Returns `true` if the session is now complete.
pub fn accept_chunk(table: &SessionTable, chunk: Chunk) -> bool {
    let mut entry = table
        .entry(chunk.session_id)
        .or_insert_with(|| ReassemblySession::new(chunk.total_chunks));
    entry.insert(chunk);
    entry.is_complete()
}
