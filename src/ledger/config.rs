//! Ledger adapter configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Permissioned ledger configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PermissionedLedgerConfig {
    /// Peer endpoint
    pub endpoint: String,
    /// Channel the audit entries are ordered on
    pub channel: String,
    /// Simulated network round trip (milliseconds)
    pub latency_ms: u64,
    /// Largest payload the ordering service accepts
    pub max_payload_bytes: usize,
    /// Channel log file; None keeps the channel in memory only
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Hex-encoded endorsement key, created on first use
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl Default for PermissionedLedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: "grpcs://localhost:7051".to_string(),
            channel: "audit-channel".to_string(),
            latency_ms: 0,
            max_payload_bytes: 64 * 1024,
            log_path: None,
            key_path: None,
        }
    }
}

/// Public ledger configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicLedgerConfig {
    /// RPC endpoint
    pub endpoint: String,
    /// API key for the RPC provider
    pub api_key: Option<String>,
    /// Refuse submissions without an API key
    pub require_credentials: bool,
    /// Blocks on top of (and including) the entry before it counts as final
    pub required_confirmations: u64,
    /// Simulated network round trip (milliseconds)
    pub latency_ms: u64,
    /// Largest payload a transaction may carry
    pub max_payload_bytes: usize,
    /// Block file; None keeps the chain in memory only
    #[serde(default)]
    pub chain_path: Option<PathBuf>,
}

impl Default for PublicLedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:8545".to_string(),
            api_key: None,
            require_credentials: false,
            required_confirmations: 1,
            latency_ms: 0,
            max_payload_bytes: 32 * 1024,
            chain_path: None,
        }
    }
}
