//! Security-relevant events recorded on the ledgers.
//!
//! Three kinds:
//! - Access-control decisions
//! - Policy version changes
//! - Regulatory compliance observations

pub mod access;
pub mod compliance;
pub mod policy;

pub use access::{AccessDecision, Decision};
pub use compliance::{ComplianceEvent, Regulation};
pub use policy::{ChangeType, PolicyChange};

use crate::core::{Result, Timestamp};
use serde::{Deserialize, Serialize};

/// Event kind identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Access-control decision
    AccessDecision,
    /// Policy version change
    PolicyChange,
    /// Compliance observation
    ComplianceEvent,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::AccessDecision => write!(f, "access_decision"),
            EventKind::PolicyChange => write!(f, "policy_change"),
            EventKind::ComplianceEvent => write!(f, "compliance_event"),
        }
    }
}

/// Any event the recorder accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    AccessDecision(AccessDecision),
    PolicyChange(PolicyChange),
    ComplianceEvent(ComplianceEvent),
}

impl AuditEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            AuditEvent::AccessDecision(_) => EventKind::AccessDecision,
            AuditEvent::PolicyChange(_) => EventKind::PolicyChange,
            AuditEvent::ComplianceEvent(_) => EventKind::ComplianceEvent,
        }
    }

    /// The principal identifier of the event: subject, policy or entity.
    pub fn subject(&self) -> &str {
        match self {
            AuditEvent::AccessDecision(e) => &e.subject_id,
            AuditEvent::PolicyChange(e) => &e.policy_id,
            AuditEvent::ComplianceEvent(e) => &e.entity_id,
        }
    }

    /// When the event happened, as reported by the caller.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            AuditEvent::AccessDecision(e) => e.timestamp,
            AuditEvent::PolicyChange(e) => e.timestamp,
            AuditEvent::ComplianceEvent(e) => e.timestamp,
        }
    }

    /// Check the required fields for this kind.
    pub fn validate(&self) -> Result<()> {
        match self {
            AuditEvent::AccessDecision(e) => e.validate(),
            AuditEvent::PolicyChange(e) => e.validate(),
            AuditEvent::ComplianceEvent(e) => e.validate(),
        }
    }
}

impl From<AccessDecision> for AuditEvent {
    fn from(event: AccessDecision) -> Self {
        AuditEvent::AccessDecision(event)
    }
}

impl From<PolicyChange> for AuditEvent {
    fn from(event: PolicyChange) -> Self {
        AuditEvent::PolicyChange(event)
    }
}

impl From<ComplianceEvent> for AuditEvent {
    fn from(event: ComplianceEvent) -> Self {
        AuditEvent::ComplianceEvent(event)
    }
}
