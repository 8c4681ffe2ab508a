//! Query filters for audit trails.

use crate::audit::record::{AuditRecord, VerificationStatus};
use crate::events::EventKind;
use serde::{Deserialize, Serialize};

/// Filter applied to records of a generated trail.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailFilter {
    /// Filter by event kind
    pub kind: Option<EventKind>,
    /// Filter by verification status
    pub status: Option<VerificationStatus>,
    /// Filter by event subject (user, policy or entity id)
    pub subject: Option<String>,
    /// Only records flagged for manual audit
    pub flagged_only: bool,
    /// Maximum results
    pub limit: Option<usize>,
}

impl TrailFilter {
    /// Create a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by event kind.
    pub fn by_kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter by verification status.
    pub fn by_status(mut self, status: VerificationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by subject.
    pub fn by_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Keep only records needing manual review.
    pub fn flagged_only(mut self) -> Self {
        self.flagged_only = true;
        self
    }

    /// Set result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a record matches this filter. The limit is not considered.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind() != kind {
                return false;
            }
        }

        if let Some(status) = self.status {
            if record.outcome.status != status {
                return false;
            }
        }

        if let Some(subject) = &self.subject {
            if record.event.subject() != subject {
                return false;
            }
        }

        if self.flagged_only && !record.outcome.flagged_for_review() {
            return false;
        }

        true
    }
}
