//! Inter-node authentication primitives used at the gateway boundary.
//!
//! Tokens are 32 random bytes rendered as 64 hex characters, generated
//! either at startup for statically configured nodes or at registration
//! time. Comparison is constant-time to avoid leaking token bytes through
//! timing.

use rand::RngCore;
use subtle::ConstantTimeEq;

/// An opaque bearer token exchanged between a relay and the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Generate a fresh random token (32 bytes, hex-encoded to 64 characters).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn from_str(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time equality check. Use this, never `==`, to compare a
    /// caller-supplied token against a stored one.
    pub fn matches(&self, candidate: &str) -> bool {
        let a = self.0.as_bytes();
        let b = candidate.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.ct_eq(b).into()
    }
}
