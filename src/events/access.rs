//! Access-control decision events.

use crate::core::{now, to_millis, Error, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Outcome of an access-control evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    /// Access granted
    Permit,
    /// Access refused
    Deny,
}

impl Decision {
    /// Wire name of the decision.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Permit => "PERMIT",
            Decision::Deny => "DENY",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One access-control evaluation.
///
/// Fields default to empty when absent from an inbound payload so that
/// [`AccessDecision::validate`] can report exactly which one is missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Subject (user/service) requesting access
    #[serde(default)]
    pub subject_id: String,
    /// Resource being accessed
    #[serde(default)]
    pub resource_id: String,
    /// Action requested on the resource
    #[serde(default)]
    pub action: String,
    /// PERMIT or DENY
    #[serde(default)]
    pub decision: Option<Decision>,
    /// Risk score assigned by the evaluator
    #[serde(default)]
    pub risk_score: f64,
    /// Contextual factors considered by the evaluator
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
    /// When the decision was made
    pub timestamp: Timestamp,
}

impl AccessDecision {
    /// Create a new access decision stamped with the current time.
    pub fn new(subject_id: &str, resource_id: &str, action: &str, decision: Decision) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            resource_id: resource_id.to_string(),
            action: action.to_string(),
            decision: Some(decision),
            risk_score: 0.0,
            context: BTreeMap::new(),
            timestamp: now(),
        }
    }

    /// Set the risk score.
    pub fn with_risk_score(mut self, risk_score: f64) -> Self {
        self.risk_score = risk_score;
        self
    }

    /// Add a context factor. A value with no JSON form (such as a map
    /// with non-string keys) is left out and logged.
    pub fn with_context(mut self, key: &str, value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.context.insert(key.to_string(), v);
            }
            Err(e) => {
                warn!(key, subject = %self.subject_id, error = %e, "context factor dropped");
            }
        }
        self
    }

    /// Set the decision time (truncated to milliseconds).
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = crate::core::from_millis(to_millis(&timestamp)).unwrap_or(timestamp);
        self
    }

    /// Whether the risk score meets or exceeds a threshold.
    pub fn is_high_risk(&self, threshold: f64) -> bool {
        self.risk_score >= threshold
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.subject_id.trim().is_empty() {
            missing.push("subject_id");
        }
        if self.resource_id.trim().is_empty() {
            missing.push("resource_id");
        }
        if self.action.trim().is_empty() {
            missing.push("action");
        }
        if self.decision.is_none() {
            missing.push("decision");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "access decision missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}
