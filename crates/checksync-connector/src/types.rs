//! Connector-facing data transfer types.

use checksync_core::ids::{EntryId, PairId};
use checksync_core::record::CheckRecord;
use serde::{Deserialize, Serialize};

/// Column names a file artifact must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "Check Description",
    "Task Status",
    "Technician Comments",
    "Manual Reference",
    "Check ID",
];

/// One conflicting pair as shown to the operator: both sides retained
/// until resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictView {
    /// Handle for resolving this pair.
    pub id: PairId,
    /// The file-side version.
    pub file: CheckRecord,
    /// The cloud-side version.
    pub cloud: CheckRecord,
}

/// One cloud record absent from the uploaded file, resolvable by the
/// operator into the approved set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingView {
    /// Handle for resolving this entry.
    pub id: EntryId,
    /// The cloud-side record.
    pub record: CheckRecord,
}

/// The four classification buckets handed to the presenter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionView {
    /// Records present and identical (on identity fields) in both sources.
    pub matching: Vec<CheckRecord>,
    /// Partially matched pairs awaiting an operator decision.
    pub conflicting: Vec<ConflictView>,
    /// File records with no counterpart in the cloud grid.
    pub missing_in_cloud: Vec<CheckRecord>,
    /// Cloud records with no counterpart in the uploaded file.
    pub missing_in_file: Vec<MissingView>,
}

impl ResolutionView {
    /// Whether there is nothing for the operator to act on.
    #[must_use]
    pub fn is_fully_matched(&self) -> bool {
        self.conflicting.is_empty()
            && self.missing_in_cloud.is_empty()
            && self.missing_in_file.is_empty()
    }
}
