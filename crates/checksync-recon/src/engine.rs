//! Record classification between the uploaded file and the cloud grid.
//!
//! Pure pairing logic: no collaborators, no state. Pairing is greedy and
//! order-dependent by design. Each file record consumes at most one cloud
//! record, and ties among equally plausible cloud candidates resolve to
//! the one earliest in extraction order. Changing this to best-match
//! scoring would change observable reconciliation results.

use serde::{Deserialize, Serialize};
use tracing::debug;

use checksync_core::record::{CheckRecord, MatchGrade};

/// A partially matched (file, cloud) pair; both sides are retained until
/// the operator resolves the conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPair {
    /// The file-side version.
    pub file: CheckRecord,
    /// The cloud-side version.
    pub cloud: CheckRecord,
}

/// The four disjoint buckets produced by [`classify`].
///
/// Every input record lands in exactly one bucket (counting a conflict
/// pair as its two constituent records).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    /// Fully matched records; the file-side version is kept as canonical.
    pub matching: Vec<CheckRecord>,
    /// Partially matched pairs, in file order.
    pub conflicting: Vec<ConflictPair>,
    /// File records with no cloud counterpart, in file order.
    pub missing_in_cloud: Vec<CheckRecord>,
    /// Cloud records left unpaired, in extraction order.
    pub missing_in_file: Vec<CheckRecord>,
}

impl Classification {
    /// Total records across all buckets; equals `|file| + |cloud|` for
    /// the inputs that produced this classification.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.matching.len()
            + 2 * self.conflicting.len()
            + self.missing_in_cloud.len()
            + self.missing_in_file.len()
    }

    /// Whether classification produced no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }
}

/// Classify the two record sequences into the four buckets.
///
/// For each file record, in order, the remaining cloud pool is scanned in
/// order: the first `Full` grade pairs into `matching`; otherwise the
/// first `Partial` grade pairs into `conflicting`; otherwise the file
/// record is `missing_in_cloud`. A paired cloud record is consumed and
/// unavailable to later file records. Whatever remains in the pool ends
/// in `missing_in_file`.
#[must_use]
pub fn classify(file_records: &[CheckRecord], cloud_records: &[CheckRecord]) -> Classification {
    let mut pool: Vec<CheckRecord> = cloud_records.to_vec();
    let mut result = Classification::default();

    for file_record in file_records {
        let mut first_partial: Option<usize> = None;
        let mut full: Option<usize> = None;

        for (index, candidate) in pool.iter().enumerate() {
            match file_record.grade_against(candidate) {
                MatchGrade::Full => {
                    full = Some(index);
                    break;
                }
                MatchGrade::Partial => {
                    if first_partial.is_none() {
                        first_partial = Some(index);
                    }
                }
                MatchGrade::None => {}
            }
        }

        if let Some(index) = full {
            pool.remove(index);
            result.matching.push(file_record.clone());
        } else if let Some(index) = first_partial {
            let cloud = pool.remove(index);
            result.conflicting.push(ConflictPair {
                file: file_record.clone(),
                cloud,
            });
        } else {
            result.missing_in_cloud.push(file_record.clone());
        }
    }

    result.missing_in_file = pool;

    debug!(
        matching = result.matching.len(),
        conflicting = result.conflicting.len(),
        missing_in_cloud = result.missing_in_cloud.len(),
        missing_in_file = result.missing_in_file.len(),
        "classified record sequences"
    );

    result
}
