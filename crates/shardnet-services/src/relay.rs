//! Relay-side mixing: batching of in-flight envelopes and a time-bucketed
//! next-hop rotation so traffic from one relay does not always land on the
//! same downstream hop.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use tokio::sync::Mutex;

/// Selects a next-hop address by dividing wall-clock time into fixed-width
/// buckets and indexing into the configured hop list. All relays sharing the
/// same rotation period and hop order pick the same hop at the same time
/// without coordinating.
pub struct HopRotation {
    rotation_period_secs: u64,
}

impl HopRotation {
    pub fn new(rotation_period_secs: u64) -> Self {
        Self {
            rotation_period_secs: rotation_period_secs.max(1),
        }
    }

    pub fn current_hop<'a>(&self, next_hops: &'a [String]) -> Option<&'a String> {
        if next_hops.is_empty() {
            return None;
        }
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let bucket = (now_secs / self.rotation_period_secs) as usize;
        Some(&next_hops[bucket % next_hops.len()])
    }
}

/// Buffers items for batched delivery instead of forwarding each one the
/// instant it arrives, so a downstream observer sees bursts rather than a
/// one-to-one timing correlation with inbound traffic. Generic so it can
/// hold either wire chunks or the relay's request envelopes.
pub struct MixBuffer<T> {
    buffer: Mutex<Vec<T>>,
}

impl<T> MixBuffer<T> {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub async fn push(&self, item: T) {
        self.buffer.lock().await.push(item);
    }

    /// Drain everything buffered so far, optionally shuffling order first.
    pub async fn drain(&self, shuffle: bool) -> Vec<T> {
        let mut buf = self.buffer.lock().await;
        let mut out = std::mem::take(&mut *buf);
        if shuffle {
            out.shuffle(&mut rand::thread_rng());
        }
        out
    }

    pub async fn len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buffer.lock().await.is_empty()
    }
}

impl<T> Default for MixBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
