//! Collaborator traits
//!
//! Capability-based trait definitions for the session's four external
//! collaborators. Each trait covers one concern; implementations are
//! injected into the session coordinator as `Arc<dyn ...>` objects and
//! awaited at the workflow's suspension points.

use async_trait::async_trait;

use checksync_core::record::CheckRecord;

use crate::error::ConnectorResult;
use crate::types::ResolutionView;

/// Extracts the ordered sequence of check records from the live grid.
#[async_trait]
pub trait GridExtractor: Send + Sync {
    /// Extract all rows, preserving grid order.
    ///
    /// Fails with [`crate::ConnectorError::SourceNotFound`] when the grid
    /// cannot be located, or [`crate::ConnectorError::EmptySource`] when
    /// it is present but has no rows.
    async fn extract(&self) -> ConnectorResult<Vec<CheckRecord>>;
}

/// Parses an uploaded artifact into an ordered sequence of check records.
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Read records from raw file bytes, preserving row order.
    ///
    /// Fails with [`crate::ConnectorError::InvalidFormat`] when a required
    /// column is missing, [`crate::ConnectorError::TooLarge`] past the
    /// size limit, or [`crate::ConnectorError::EmptyFile`] for a blank
    /// artifact.
    async fn read(&self, bytes: &[u8]) -> ConnectorResult<Vec<CheckRecord>>;
}

/// Renders classification buckets to the operator.
///
/// The presenter is a one-way surface from the core's point of view:
/// operator decisions come back as calls on the session coordinator
/// (resolve a conflict, resolve a missing entry, request write-back,
/// cancel), never through this trait.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Show the four buckets for resolution.
    async fn present(&self, view: &ResolutionView) -> ConnectorResult<()>;
}

/// Applies approved records back to the live source.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Apply a single record.
    ///
    /// Invoked sequentially, in approval order; implementations may have
    /// positional side effects and must never be called concurrently.
    /// Fails with [`crate::ConnectorError::WriteFailed`].
    async fn apply_one(&self, record: &CheckRecord) -> ConnectorResult<()>;
}
