//! Regulatory compliance events.

use crate::core::{from_millis, now, to_millis, ContentHash, Error, Result, Timestamp};
use crate::crypto::sha3_256;
use crate::hashing::CanonicalHasher;
use serde::{Deserialize, Serialize};

/// Regulations a compliance observation can be tagged with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regulation {
    /// GDPR
    GDPR,
    /// SOC2
    SOC2,
    /// HIPAA
    HIPAA,
    /// PCI DSS
    PCIDSS,
    /// ISO 27001
    ISO27001,
    /// CCPA
    CCPA,
}

impl Regulation {
    /// Wire name of the regulation tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Regulation::GDPR => "GDPR",
            Regulation::SOC2 => "SOC2",
            Regulation::HIPAA => "HIPAA",
            Regulation::PCIDSS => "PCIDSS",
            Regulation::ISO27001 => "ISO27001",
            Regulation::CCPA => "CCPA",
        }
    }
}

/// One regulatory observation.
///
/// The constructors derive `evidence_hash` from the evidence. A decoded
/// event keeps the hash it was encoded with; an all-zero hash fails
/// validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceEvent {
    /// Event type (e.g. "data_retention_check")
    pub event_type: String,
    /// Regulation the observation relates to
    pub regulation: Regulation,
    /// Entity under observation
    pub entity_id: String,
    /// Whether the entity was found compliant
    pub compliant: bool,
    /// Hash of the supporting evidence
    evidence_hash: ContentHash,
    /// When the observation was made
    pub timestamp: Timestamp,
}

impl ComplianceEvent {
    /// Create a compliance event from raw evidence bytes.
    pub fn new(
        event_type: &str,
        regulation: Regulation,
        entity_id: &str,
        compliant: bool,
        evidence: &[u8],
    ) -> Self {
        Self {
            event_type: event_type.to_string(),
            regulation,
            entity_id: entity_id.to_string(),
            compliant,
            evidence_hash: sha3_256(evidence),
            timestamp: now(),
        }
    }

    /// Create a compliance event from structured evidence.
    pub fn with_json_evidence(
        event_type: &str,
        regulation: Regulation,
        entity_id: &str,
        compliant: bool,
        evidence: &serde_json::Value,
    ) -> Result<Self> {
        let mut event = Self::new(event_type, regulation, entity_id, compliant, &[]);
        event.evidence_hash = CanonicalHasher::hash_value(evidence)?;
        Ok(event)
    }

    /// Set the observation time (truncated to milliseconds).
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = from_millis(to_millis(&timestamp)).unwrap_or(timestamp);
        self
    }

    /// Hash of the supporting evidence.
    pub fn evidence_hash(&self) -> &ContentHash {
        &self.evidence_hash
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        if self.event_type.trim().is_empty() {
            return Err(Error::Validation("compliance event missing event_type".into()));
        }
        if self.entity_id.trim().is_empty() {
            return Err(Error::Validation("compliance event missing entity_id".into()));
        }
        if self.evidence_hash == ContentHash::zero() {
            return Err(Error::Validation(format!(
                "compliance event {} has no evidence hash",
                self.event_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evidence_hash_is_derived() {
        let a = ComplianceEvent::new("retention", Regulation::GDPR, "db-1", true, b"report-v1");
        let b = ComplianceEvent::new("retention", Regulation::GDPR, "db-1", true, b"report-v2");
        assert_eq!(a.evidence_hash(), &sha3_256(b"report-v1"));
        assert_ne!(a.evidence_hash(), b.evidence_hash());
    }

    #[test]
    fn test_json_evidence_ignores_key_order() {
        let a = ComplianceEvent::with_json_evidence(
            "encryption",
            Regulation::HIPAA,
            "bucket-9",
            false,
            &json!({"algo": "none", "scanned": 12}),
        )
        .unwrap();
        let b = ComplianceEvent::with_json_evidence(
            "encryption",
            Regulation::HIPAA,
            "bucket-9",
            false,
            &json!({"scanned": 12, "algo": "none"}),
        )
        .unwrap();
        assert_eq!(a.evidence_hash(), b.evidence_hash());
    }

    #[test]
    fn test_validation() {
        let event = ComplianceEvent::new("", Regulation::SOC2, "svc", true, b"e");
        assert!(matches!(event.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_observation_time_truncated_to_millis() {
        let precise = from_millis(1_700_000_000_123).unwrap() + chrono::Duration::microseconds(999);
        let event = ComplianceEvent::new("audit", Regulation::HIPAA, "svc", true, b"e").at(precise);
        assert_eq!(event.timestamp, from_millis(1_700_000_000_123).unwrap());
    }

    #[test]
    fn test_decoded_event_without_evidence_hash_rejected() {
        let event = ComplianceEvent::new("audit", Regulation::SOC2, "svc", true, b"e");
        let mut encoded = serde_json::to_value(&event).unwrap();
        encoded["evidence_hash"] = json!(ContentHash::zero().to_hex());

        let decoded: ComplianceEvent = serde_json::from_value(encoded).unwrap();
        assert!(matches!(decoded.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_unknown_regulation_rejected_on_decode() {
        let err = serde_json::from_str::<Regulation>("\"FERPA\"");
        assert!(err.is_err());
        assert_eq!(
            serde_json::from_str::<Regulation>("\"ISO27001\"").unwrap(),
            Regulation::ISO27001
        );
    }
}
