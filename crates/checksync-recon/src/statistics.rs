//! Session statistics tracking.

use serde::{Deserialize, Serialize};

use crate::engine::Classification;

/// Counters for one reconciliation session, from classification through
/// write-back. Serialized into observer payloads and the final session
/// summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Records extracted from the cloud grid.
    #[serde(default)]
    pub cloud_records: usize,
    /// Records parsed from the uploaded file.
    #[serde(default)]
    pub file_records: usize,
    /// Fully matched records after classification.
    #[serde(default)]
    pub matching: usize,
    /// Conflict pairs after classification.
    #[serde(default)]
    pub conflicting: usize,
    /// File records without a cloud counterpart.
    #[serde(default)]
    pub missing_in_cloud: usize,
    /// Cloud records without a file counterpart.
    #[serde(default)]
    pub missing_in_file: usize,
    /// Operator resolutions applied so far.
    #[serde(default)]
    pub resolutions_applied: usize,
    /// Approved records in the current write-back batch.
    #[serde(default)]
    pub records_to_write: usize,
    /// Approved records successfully written back.
    #[serde(default)]
    pub records_written: usize,
}

impl SessionStats {
    /// Seed the counters from a classification outcome.
    #[must_use]
    pub fn from_classification(classification: &Classification) -> Self {
        let matching = classification.matching.len();
        let conflicting = classification.conflicting.len();
        let missing_in_cloud = classification.missing_in_cloud.len();
        let missing_in_file = classification.missing_in_file.len();
        Self {
            cloud_records: matching + conflicting + missing_in_file,
            file_records: matching + conflicting + missing_in_cloud,
            matching,
            conflicting,
            missing_in_cloud,
            missing_in_file,
            resolutions_applied: 0,
            records_to_write: 0,
            records_written: 0,
        }
    }

    /// Record one applied operator resolution.
    pub fn record_resolution(&mut self) {
        self.resolutions_applied += 1;
    }

    /// Write-back progress as a percentage of the current batch.
    #[must_use]
    pub fn write_progress_percentage(&self) -> f64 {
        if self.records_to_write == 0 {
            0.0
        } else {
            (self.records_written as f64 / self.records_to_write as f64) * 100.0
        }
    }
}
