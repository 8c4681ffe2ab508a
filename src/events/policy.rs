//! Policy version change events.

use crate::core::{from_millis, now, to_millis, ContentHash, Error, Result, Timestamp};
use crate::hashing::CanonicalHasher;
use serde::{Deserialize, Serialize};

/// Kind of policy transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// New policy
    Create,
    /// New version of an existing policy
    Update,
    /// Policy retired
    Delete,
}

impl ChangeType {
    /// Wire name of the change type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "CREATE",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
        }
    }
}

/// One policy version transition.
///
/// `new` derives `new_hash` from the policy content. A decoded change
/// (e.g. a reloaded audit record) keeps the hash it was encoded with, since
/// the content itself is never stored; an all-zero hash fails validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyChange {
    /// Policy identifier
    pub policy_id: String,
    /// Version number after the change
    pub version: u64,
    /// Kind of change
    pub change_type: ChangeType,
    /// Author of the change
    pub author_id: String,
    /// Content hash of the previous version
    pub previous_hash: Option<ContentHash>,
    /// Content hash of the new version
    new_hash: ContentHash,
    /// When the change was made
    pub timestamp: Timestamp,
}

impl PolicyChange {
    /// Create a policy change; `new_hash` is derived from the policy content.
    pub fn new(
        policy_id: &str,
        version: u64,
        change_type: ChangeType,
        author_id: &str,
        content: &serde_json::Value,
    ) -> Result<Self> {
        Ok(Self {
            policy_id: policy_id.to_string(),
            version,
            change_type,
            author_id: author_id.to_string(),
            previous_hash: None,
            new_hash: CanonicalHasher::hash_value(content)?,
            timestamp: now(),
        })
    }

    /// Set the previous version's hash.
    pub fn with_previous(mut self, previous_hash: ContentHash) -> Self {
        self.previous_hash = Some(previous_hash);
        self
    }

    /// Set the change time (truncated to milliseconds).
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = from_millis(to_millis(&timestamp)).unwrap_or(timestamp);
        self
    }

    /// Content hash of the new policy version.
    pub fn new_hash(&self) -> &ContentHash {
        &self.new_hash
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        if self.policy_id.trim().is_empty() {
            return Err(Error::Validation("policy change missing policy_id".into()));
        }
        if self.author_id.trim().is_empty() {
            return Err(Error::Validation("policy change missing author_id".into()));
        }
        if self.version == 0 {
            return Err(Error::Validation("policy version must be positive".into()));
        }
        if self.new_hash == ContentHash::zero() {
            return Err(Error::Validation(format!(
                "policy {} has no content hash",
                self.policy_id
            )));
        }
        if self.change_type != ChangeType::Create && self.previous_hash.is_none() {
            return Err(Error::Validation(format!(
                "previous_hash required for {} of policy {}",
                self.change_type.as_str(),
                self.policy_id
            )));
        }
        Ok(())
    }
}
