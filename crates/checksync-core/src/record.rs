//! Check record model and identity match grading.
//!
//! A check record carries five string fields. Three of them (description,
//! manual reference, check id) form the record's identity across sources;
//! the other two (task status, technician comments) are operator-editable
//! payload and never participate in matching.

use serde::{Deserialize, Serialize};

/// A single check record, as extracted from the cloud grid or parsed from
/// an uploaded file.
///
/// Absent values are represented as empty strings, never as `None`. Wire
/// names use the source system's camelCase (`checkDescription`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRecord {
    /// What the check verifies. Identity field.
    #[serde(default)]
    pub check_description: String,

    /// Current disposition of the task (e.g. "Pass", "Fail"). Payload.
    #[serde(default)]
    pub task_status: String,

    /// Free-text notes from the technician. Payload.
    #[serde(default)]
    pub technician_comments: String,

    /// Reference into the maintenance manual. Identity field.
    #[serde(default)]
    pub manual_reference: String,

    /// Check identifier within the manual section. Identity field.
    #[serde(default)]
    pub check_id: String,
}

impl CheckRecord {
    /// Create a record from its five fields.
    #[must_use]
    pub fn new(
        check_description: impl Into<String>,
        task_status: impl Into<String>,
        technician_comments: impl Into<String>,
        manual_reference: impl Into<String>,
        check_id: impl Into<String>,
    ) -> Self {
        Self {
            check_description: check_description.into(),
            task_status: task_status.into(),
            technician_comments: technician_comments.into(),
            manual_reference: manual_reference.into(),
            check_id: check_id.into(),
        }
    }

    /// Return a copy with the payload fields replaced and the identity
    /// fields untouched. Used when an operator resolution supplies the
    /// status and comments for a record.
    #[must_use]
    pub fn with_payload(
        &self,
        task_status: impl Into<String>,
        technician_comments: impl Into<String>,
    ) -> Self {
        Self {
            check_description: self.check_description.clone(),
            task_status: task_status.into(),
            technician_comments: technician_comments.into(),
            manual_reference: self.manual_reference.clone(),
            check_id: self.check_id.clone(),
        }
    }

    /// Whether all three identity fields equal the other record's.
    #[must_use]
    pub fn same_identity(&self, other: &CheckRecord) -> bool {
        self.grade_against(other) == MatchGrade::Full
    }

    /// Grade this record (file side) against a candidate (cloud side).
    ///
    /// `Partial` covers two shapes: the description matches but not all
    /// three identity fields do, or the description differs while both the
    /// manual reference and the check id match. A description-only match
    /// is deliberately a `Partial` (a conflict to put in front of the
    /// operator), not a non-match.
    #[must_use]
    pub fn grade_against(&self, other: &CheckRecord) -> MatchGrade {
        let description = self.check_description == other.check_description;
        let reference = self.manual_reference == other.manual_reference;
        let id = self.check_id == other.check_id;

        if description && reference && id {
            MatchGrade::Full
        } else if description || (reference && id) {
            MatchGrade::Partial
        } else {
            MatchGrade::None
        }
    }
}

/// How strongly a (file, cloud) candidate pair matches on identity fields.
///
/// Derived per comparison, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchGrade {
    /// All three identity fields equal.
    Full,
    /// Enough identity overlap to pair the records, but not all three
    /// fields agree; the pair is a conflict for the operator.
    Partial,
    /// Insufficient identity overlap; the records are unrelated.
    None,
}

impl MatchGrade {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchGrade::Full => "full",
            MatchGrade::Partial => "partial",
            MatchGrade::None => "none",
        }
    }
}

impl std::fmt::Display for MatchGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
