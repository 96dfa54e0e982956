//! Per-role configuration.
//!
//! CLI argument parsing and config-file discovery are external front-end
//! concerns (see the crate-level docs); this module only defines the typed
//! configuration each role needs and a minimal env-var/file loading path so
//! a front-end has something concrete to hand the core pipeline.
//!
//! Resolution order: environment variables → config file → defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Encryption is opt-in per the protocol: when disabled, chunks transit with
/// raw payloads and no nonce is prepended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub enabled: bool,
    /// 64 hex characters (32 bytes). Required when `enabled` is true.
    /// Always sourced from config, never a hardcoded constant.
    pub key_hex: Option<String>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key_hex: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address this node listens on for response chunks (`/chunk`, `/health`).
    pub listen_addr: String,
    /// Upstream node addresses, dispatched round-robin.
    pub upstreams: Vec<String>,
    pub chunk_size: usize,
    pub timeout_ms: u64,
    pub encryption: EncryptionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9000".to_string(),
            upstreams: Vec::new(),
            chunk_size: 8192,
            timeout_ms: super::wire::DEFAULT_CLIENT_TIMEOUT_MS,
            encryption: EncryptionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub listen_addr: String,
    pub central_addr: String,
    /// Upper bound (ms) of the uniform jitter sleep before forwarding.
    pub jitter_max_ms: u64,
    pub encryption: EncryptionConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9100".to_string(),
            central_addr: "127.0.0.1:9200".to_string(),
            jitter_max_ms: 0,
            encryption: EncryptionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralConfig {
    pub listen_addr: String,
    pub downstreams: Vec<String>,
    pub chunk_size: usize,
    pub reassembly_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub outbound_timeout_secs: u64,
    /// When set, outbound requests are sent to this relay's `/relay` endpoint
    /// instead of issued directly. See the design notes on gateway-mode
    /// response delivery being incomplete in the source protocol.
    pub relay_addr: Option<String>,
    pub encryption: EncryptionConfig,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9200".to_string(),
            downstreams: Vec::new(),
            chunk_size: 8192,
            reassembly_timeout_secs: super::wire::DEFAULT_REASSEMBLY_TIMEOUT_SECS,
            sweep_interval_secs: super::wire::DEFAULT_SWEEP_INTERVAL_SECS,
            outbound_timeout_secs: super::wire::DEFAULT_OUTBOUND_TIMEOUT_SECS,
            relay_addr: None,
            encryption: EncryptionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    pub listen_addr: String,
    pub chunk_size: usize,
    pub reassembly_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub encryption: EncryptionConfig,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9300".to_string(),
            chunk_size: 8192,
            reassembly_timeout_secs: super::wire::DEFAULT_REASSEMBLY_TIMEOUT_SECS,
            sweep_interval_secs: super::wire::DEFAULT_SWEEP_INTERVAL_SECS,
            encryption: EncryptionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen_addr: String,
    pub node_id: String,
    /// Candidate next-hop `/relay` addresses. Ignored when `gateway_url` is
    /// the terminus and this list is empty.
    pub next_hops: Vec<String>,
    pub gateway_url: Option<String>,
    /// Shared secret used once, at registration, to mint a gateway token.
    pub gateway_secret: Option<String>,
    pub mixing: bool,
    pub rotation_period_secs: u64,
    pub flush_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9400".to_string(),
            node_id: "relay-0".to_string(),
            next_hops: Vec::new(),
            gateway_url: None,
            gateway_secret: None,
            mixing: false,
            rotation_period_secs: 30,
            flush_interval_secs: super::wire::DEFAULT_RELAY_FLUSH_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Node id -> shared secret, checked at `/register`.
    pub node_secrets: std::collections::HashMap<String, String>,
    pub jitter_ms: u64,
    pub mixing: bool,
    pub batch_interval_secs: u64,
    pub outbound_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9500".to_string(),
            node_secrets: std::collections::HashMap::new(),
            jitter_ms: 0,
            mixing: false,
            batch_interval_secs: super::wire::DEFAULT_GATEWAY_BATCH_SECS,
            outbound_timeout_secs: super::wire::DEFAULT_OUTBOUND_TIMEOUT_SECS,
        }
    }
}

/// Top-level configuration: every role's settings, plus which one is active
/// on this node. A single file can describe a whole test topology; a
/// deployed node only reads the section matching its `role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardnetConfig {
    pub role: super::wire::NodeRole,
    pub client: ClientConfig,
    pub upstream: UpstreamConfig,
    pub central: CentralConfig,
    pub downstream: DownstreamConfig,
    pub relay: RelayConfig,
    pub gateway: GatewayConfig,
}

impl Default for ShardnetConfig {
    fn default() -> Self {
        Self {
            role: super::wire::NodeRole::Client,
            client: ClientConfig::default(),
            upstream: UpstreamConfig::default(),
            central: CentralConfig::default(),
            downstream: DownstreamConfig::default(),
            relay: RelayConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

use thiserror::Error;

/// Load a role's TOML config section from `path`, falling back to defaults
/// if the file does not exist. `T` is one of the per-role config structs.
pub fn load_from_file<T>(path: &PathBuf) -> Result<T, ConfigError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let text =
        std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))
}

impl ShardnetConfig {
    /// Load config: environment variables → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config: ShardnetConfig = load_from_file(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path: `$SHARDNET_CONFIG`, else `./shardnet.toml`.
    pub fn file_path() -> PathBuf {
        std::env::var("SHARDNET_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("shardnet.toml"))
    }

    /// Apply `SHARDNET_*` environment overrides on top of the loaded file.
    /// Only the handful of settings an operator is likely to override
    /// per-instance (without hand-editing the shared config file) are
    /// covered here.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SHARDNET_ROLE") {
            if let Ok(role) = serde_json::from_value::<super::wire::NodeRole>(
                serde_json::Value::String(v.to_lowercase()),
            ) {
                self.role = role;
            }
        }
        if let Ok(v) = std::env::var("SHARDNET_LISTEN_ADDR") {
            match self.role {
                super::wire::NodeRole::Client => self.client.listen_addr = v,
                super::wire::NodeRole::Upstream => self.upstream.listen_addr = v,
                super::wire::NodeRole::Central => self.central.listen_addr = v,
                super::wire::NodeRole::Downstream => self.downstream.listen_addr = v,
                super::wire::NodeRole::Relay => self.relay.listen_addr = v,
                super::wire::NodeRole::Gateway => self.gateway.listen_addr = v,
            }
        }
    }
}
