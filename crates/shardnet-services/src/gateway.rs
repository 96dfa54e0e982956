//! Gateway-side node authentication: a registry mapping permitted node ids
//! and their shared secrets to bearer tokens issued at registration time.

use std::collections::HashMap;

use dashmap::DashMap;
use shardnet_core::auth::AuthToken;

pub struct AuthRegistry {
    tokens: DashMap<String, AuthToken>,
    node_secrets: HashMap<String, String>,
}

impl AuthRegistry {
    pub fn new(node_secrets: HashMap<String, String>) -> Self {
        Self {
            tokens: DashMap::new(),
            node_secrets,
        }
    }

    /// Issue a fresh token for `node_id` if `secret` matches its configured
    /// shared secret. A second registration from the same node overwrites
    /// its old token.
    pub fn register(&self, node_id: &str, secret: &str) -> Option<AuthToken> {
        let expected = self.node_secrets.get(node_id)?;
        if !AuthToken::from_str(expected.clone()).matches(secret) {
            return None;
        }
        let token = AuthToken::generate();
        self.tokens.insert(node_id.to_string(), token.clone());
        Some(token)
    }

    /// Constant-time check that `candidate` is the current token for
    /// `node_id`.
    pub fn verify(&self, node_id: &str, candidate: &str) -> bool {
        self.tokens
            .get(node_id)
            .map(|t| t.matches(candidate))
            .unwrap_or(false)
    }

    pub fn registered_count(&self) -> usize {
        self.tokens.len()
    }
}
