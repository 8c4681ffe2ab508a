//! Engine configuration.
//!
//! Supplied by the environment; the engine consumes it but does not own it.

use crate::audit::retry::RetryPolicy;
use crate::core::{Error, Result};
use crate::ledger::config::{PermissionedLedgerConfig, PublicLedgerConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Audit record store configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON-lines file; None keeps records in memory only
    pub path: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Permissioned ledger settings
    pub permissioned: PermissionedLedgerConfig,
    /// Public ledger settings
    pub public: PublicLedgerConfig,
    /// Retry policy applied to each ledger independently
    pub retry: RetryPolicy,
    /// Upper bound on a single submission attempt (milliseconds)
    pub call_timeout_ms: u64,
    /// Shared budget for the verification re-queries (milliseconds)
    pub verification_budget_ms: u64,
    /// Audit record store
    pub store: StoreConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            permissioned: PermissionedLedgerConfig::default(),
            public: PublicLedgerConfig::default(),
            retry: RetryPolicy::default(),
            call_timeout_ms: 5_000,
            verification_budget_ms: 3_000,
            store: StoreConfig::default(),
        }
    }
}

impl AuditConfig {
    /// Persist audit records to the given file. Ledger files not already
    /// configured are placed beside it.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = Some(path.into());
        self.place_ledger_files();
        self
    }

    /// Fill unset ledger paths with siblings of the store file:
    /// `<stem>.permissioned.jsonl`, `<stem>.endorsement.key`,
    /// `<stem>.public.jsonl`.
    fn place_ledger_files(&mut self) {
        let Some(store) = self.store.path.clone() else {
            return;
        };
        let sibling = |suffix: &str| {
            let stem = store
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "audit".to_string());
            store.with_file_name(format!("{}.{}", stem, suffix))
        };

        if self.permissioned.log_path.is_none() {
            self.permissioned.log_path = Some(sibling("permissioned.jsonl"));
        }
        if self.permissioned.key_path.is_none() {
            self.permissioned.key_path = Some(sibling("endorsement.key"));
        }
        if self.public.chain_path.is_none() {
            self.public.chain_path = Some(sibling("public.jsonl"));
        }
    }

    /// Per-attempt submission timeout.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Verification re-query budget.
    pub fn verification_budget(&self) -> Duration {
        Duration::from_millis(self.verification_budget_ms)
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("AUDIT_PERMISSIONED_ENDPOINT") {
            config.permissioned.endpoint = endpoint;
        }
        if let Some(channel) = lookup("AUDIT_PERMISSIONED_CHANNEL") {
            config.permissioned.channel = channel;
        }
        if let Some(endpoint) = lookup("AUDIT_PUBLIC_ENDPOINT") {
            config.public.endpoint = endpoint;
        }
        if let Some(api_key) = lookup("AUDIT_PUBLIC_API_KEY") {
            config.public.api_key = Some(api_key);
            config.public.require_credentials = true;
        }
        if let Some(v) = parse_var(&lookup, "AUDIT_PUBLIC_CONFIRMATIONS")? {
            config.public.required_confirmations = v;
        }
        if let Some(v) = parse_var(&lookup, "AUDIT_CALL_TIMEOUT_MS")? {
            config.call_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "AUDIT_RETRY_ATTEMPTS")? {
            config.retry.max_attempts = v;
        }
        if let Some(v) = parse_var(&lookup, "AUDIT_RETRY_BACKOFF_MS")? {
            config.retry.backoff_base_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "AUDIT_VERIFY_BUDGET_MS")? {
            config.verification_budget_ms = v;
        }
        if let Some(path) = lookup("AUDIT_PERMISSIONED_LOG") {
            config.permissioned.log_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("AUDIT_ENDORSEMENT_KEY") {
            config.permissioned.key_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("AUDIT_PUBLIC_CHAIN") {
            config.public.chain_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("AUDIT_STORE_PATH") {
            config.store.path = Some(PathBuf::from(path));
            config.place_ledger_files();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make recording hang or never try, and a
    /// durable store paired with ledgers that forget their entries.
    pub fn validate(&self) -> Result<()> {
        if self.permissioned.endpoint.trim().is_empty() {
            return Err(Error::Config("permissioned endpoint is empty".into()));
        }
        if self.public.endpoint.trim().is_empty() {
            return Err(Error::Config("public endpoint is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry attempts must be at least 1".into()));
        }
        if self.call_timeout_ms == 0 {
            return Err(Error::Config("call timeout must be positive".into()));
        }
        if self.verification_budget_ms == 0 {
            return Err(Error::Config("verification budget must be positive".into()));
        }
        if self.store.path.is_some() {
            let volatile: Vec<&str> = [
                ("permissioned.log_path", self.permissioned.log_path.is_none()),
                ("permissioned.key_path", self.permissioned.key_path.is_none()),
                ("public.chain_path", self.public.chain_path.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect();
            if !volatile.is_empty() {
                return Err(Error::Config(format!(
                    "durable audit store needs durable ledgers; unset: {}",
                    volatile.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}
