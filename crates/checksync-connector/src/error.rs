//! Connector error types
//!
//! Fault taxonomy for the collaborator boundaries. Every variant except
//! [`ConnectorError::EmptySource`] routes through the workflow's error
//! latch; an empty source is a defined empty-result outcome that the
//! session coordinator handles as a clean abort.

use thiserror::Error;

/// Error that can occur at a collaborator boundary.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Extraction errors
    /// The live source grid could not be located at all.
    #[error("source grid not found: {message}")]
    SourceNotFound { message: String },

    /// The grid was located but yielded no rows.
    #[error("source grid contains no rows")]
    EmptySource,

    // File errors
    /// The uploaded artifact had no content.
    #[error("uploaded file is empty")]
    EmptyFile,

    /// The uploaded artifact does not match the expected layout.
    #[error("invalid file format: {message}")]
    InvalidFormat { message: String },

    /// The uploaded artifact exceeds the configured size limit.
    #[error("file too large: {size_bytes} bytes (limit {max_bytes})")]
    TooLarge { size_bytes: usize, max_bytes: usize },

    // Presentation errors
    /// The resolution surface could not be shown.
    #[error("presentation failed: {message}")]
    PresentationFailed { message: String },

    // Write-back errors
    /// Applying one approved record to the live source failed.
    #[error("write-back failed for check '{check_id}': {reason}")]
    WriteFailed { check_id: String, reason: String },
}

impl ConnectorError {
    /// Whether this is the defined empty-result outcome rather than a
    /// fault. The coordinator aborts cleanly to idle on it instead of
    /// latching an error.
    #[must_use]
    pub fn is_empty_result(&self) -> bool {
        matches!(self, ConnectorError::EmptySource)
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_source_is_an_empty_result() {
        assert!(ConnectorError::EmptySource.is_empty_result());
        assert!(!ConnectorError::EmptyFile.is_empty_result());
        assert!(!ConnectorError::SourceNotFound {
            message: "grid missing".into()
        }
        .is_empty_result());
    }

    #[test]
    fn write_failed_names_the_check() {
        let err = ConnectorError::WriteFailed {
            check_id: "C7".into(),
            reason: "cell rejected input".into(),
        };
        assert_eq!(
            err.to_string(),
            "write-back failed for check 'C7': cell rejected input"
        );
    }
}
