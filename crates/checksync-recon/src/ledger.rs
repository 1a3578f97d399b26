//! Resolution ledger
//!
//! Tracks operator decisions that move conflicting or missing-in-file
//! records into the approved (matching) set. The ledger adopts a
//! [`Classification`], hands out stable ids for the resolvable entries,
//! and recomputes bucket membership on every decision. Resolutions are
//! idempotent in the failure direction: a second decision against the
//! same id finds nothing and reports it, rather than duplicating records.

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use checksync_connector::types::{ConflictView, MissingView, ResolutionView};
use checksync_core::ids::{EntryId, PairId};
use checksync_core::record::CheckRecord;

use crate::engine::{Classification, ConflictPair};

/// Errors from ledger operations. Both variants are recoverable and are
/// reported inline to the operator; they never reach the workflow
/// machine.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Required operator input was missing.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The resolution target is no longer present (already resolved or
    /// never existed).
    #[error("resolution target not found: {id}")]
    NotFound { id: Uuid },
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// A conflicting pair held by the ledger.
#[derive(Debug, Clone)]
struct ConflictEntry {
    id: PairId,
    pair: ConflictPair,
}

/// A missing-in-file cloud record held by the ledger.
#[derive(Debug, Clone)]
struct MissingEntry {
    id: EntryId,
    record: CheckRecord,
}

/// Ledger of one session's buckets and the operator's decisions so far.
#[derive(Debug)]
pub struct ResolutionLedger {
    matching: Vec<CheckRecord>,
    conflicts: Vec<ConflictEntry>,
    missing_in_cloud: Vec<CheckRecord>,
    missing_in_file: Vec<MissingEntry>,
    /// Resolved records in the order the operator approved them; this is
    /// the exact order write-back must use.
    approved: Vec<CheckRecord>,
}

impl ResolutionLedger {
    /// Adopt a classification, assigning resolution ids to the entries
    /// the operator can act on.
    #[must_use]
    pub fn new(classification: Classification) -> Self {
        Self {
            matching: classification.matching,
            conflicts: classification
                .conflicting
                .into_iter()
                .map(|pair| ConflictEntry {
                    id: PairId::new(),
                    pair,
                })
                .collect(),
            missing_in_cloud: classification.missing_in_cloud,
            missing_in_file: classification
                .missing_in_file
                .into_iter()
                .map(|record| MissingEntry {
                    id: EntryId::new(),
                    record,
                })
                .collect(),
            approved: Vec::new(),
        }
    }

    /// Resolve one conflicting pair.
    ///
    /// The resolved record takes its identity fields from the cloud side
    /// of the pair and its payload fields from the operator's input. The
    /// pair leaves the conflict bucket and the record joins both the
    /// matching set and the approval list.
    pub fn resolve_conflict(
        &mut self,
        pair_id: PairId,
        task_status: &str,
        technician_comments: &str,
    ) -> LedgerResult<CheckRecord> {
        Self::require_status(task_status)?;

        let position = self
            .conflicts
            .iter()
            .position(|entry| entry.id == pair_id)
            .ok_or(LedgerError::NotFound {
                id: *pair_id.as_uuid(),
            })?;

        let entry = self.conflicts.remove(position);
        let resolved = entry.pair.cloud.with_payload(task_status, technician_comments);
        self.matching.push(resolved.clone());
        self.approved.push(resolved.clone());

        info!(pair_id = %pair_id, check_id = %resolved.check_id, "conflict resolved");
        Ok(resolved)
    }

    /// Resolve one missing-in-file cloud record into the approved set.
    ///
    /// Identity fields come from the cloud record; payload fields are
    /// overwritten with the operator's input.
    pub fn resolve_missing(
        &mut self,
        entry_id: EntryId,
        task_status: &str,
        technician_comments: &str,
    ) -> LedgerResult<CheckRecord> {
        Self::require_status(task_status)?;

        let position = self
            .missing_in_file
            .iter()
            .position(|entry| entry.id == entry_id)
            .ok_or(LedgerError::NotFound {
                id: *entry_id.as_uuid(),
            })?;

        let entry = self.missing_in_file.remove(position);
        let resolved = entry.record.with_payload(task_status, technician_comments);
        self.matching.push(resolved.clone());
        self.approved.push(resolved.clone());

        info!(entry_id = %entry_id, check_id = %resolved.check_id, "missing record resolved");
        Ok(resolved)
    }

    fn require_status(task_status: &str) -> LedgerResult<()> {
        if task_status.trim().is_empty() {
            debug!("resolution rejected: empty task status");
            return Err(LedgerError::Validation {
                message: "status required".to_string(),
            });
        }
        Ok(())
    }

    /// The matching bucket, canonical records plus resolved additions.
    #[must_use]
    pub fn matching(&self) -> &[CheckRecord] {
        &self.matching
    }

    /// File records with no cloud counterpart.
    #[must_use]
    pub fn missing_in_cloud(&self) -> &[CheckRecord] {
        &self.missing_in_cloud
    }

    /// Records resolved so far, in approval order.
    #[must_use]
    pub fn approved_records(&self) -> &[CheckRecord] {
        &self.approved
    }

    /// Number of unresolved conflict pairs.
    #[must_use]
    pub fn open_conflicts(&self) -> usize {
        self.conflicts.len()
    }

    /// Number of unresolved missing-in-file entries.
    #[must_use]
    pub fn open_missing(&self) -> usize {
        self.missing_in_file.len()
    }

    /// Snapshot of all four buckets for the presenter.
    #[must_use]
    pub fn view(&self) -> ResolutionView {
        ResolutionView {
            matching: self.matching.clone(),
            conflicting: self
                .conflicts
                .iter()
                .map(|entry| ConflictView {
                    id: entry.id,
                    file: entry.pair.file.clone(),
                    cloud: entry.pair.cloud.clone(),
                })
                .collect(),
            missing_in_cloud: self.missing_in_cloud.clone(),
            missing_in_file: self
                .missing_in_file
                .iter()
                .map(|entry| MissingView {
                    id: entry.id,
                    record: entry.record.clone(),
                })
                .collect(),
        }
    }
}
