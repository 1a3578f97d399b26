//! Fixed-schema delimited file reader.
//!
//! Parses the five-column delimited text artifact operators upload. The
//! layout is fixed: a header row naming the five required columns, then
//! one record per line. No quoting or dialect handling; fields are split
//! on the configured delimiter and trimmed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use checksync_core::record::CheckRecord;

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::FileReader;
use crate::types::REQUIRED_COLUMNS;

/// Configuration for [`DelimitedReader`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelimitedReaderConfig {
    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Maximum accepted artifact size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_delimiter() -> char {
    '\t'
}

fn default_max_bytes() -> usize {
    1024 * 1024
}

impl Default for DelimitedReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// Reader for the fixed five-column delimited layout.
pub struct DelimitedReader {
    config: DelimitedReaderConfig,
}

impl DelimitedReader {
    /// Create a reader with default configuration (tab-delimited, 1 MiB).
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: DelimitedReaderConfig::default(),
        }
    }

    /// Create a reader with custom configuration.
    #[must_use]
    pub fn with_config(config: DelimitedReaderConfig) -> Self {
        Self { config }
    }

    fn parse(&self, bytes: &[u8]) -> ConnectorResult<Vec<CheckRecord>> {
        if bytes.len() > self.config.max_bytes {
            return Err(ConnectorError::TooLarge {
                size_bytes: bytes.len(),
                max_bytes: self.config.max_bytes,
            });
        }

        let text = std::str::from_utf8(bytes).map_err(|e| ConnectorError::InvalidFormat {
            message: format!("file is not valid UTF-8: {e}"),
        })?;

        if text.trim().is_empty() {
            return Err(ConnectorError::EmptyFile);
        }

        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header = lines.next().ok_or(ConnectorError::EmptyFile)?;
        let columns: Vec<&str> = header
            .split(self.config.delimiter)
            .map(str::trim)
            .collect();

        // Map each required column name to its position in the header.
        let mut positions = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, name) in REQUIRED_COLUMNS.iter().enumerate() {
            positions[slot] = columns.iter().position(|c| c == name).ok_or_else(|| {
                ConnectorError::InvalidFormat {
                    message: format!("missing required column '{name}'"),
                }
            })?;
        }

        let mut records = Vec::new();
        for line in lines {
            let fields: Vec<&str> = line.split(self.config.delimiter).map(str::trim).collect();
            let field = |slot: usize| fields.get(positions[slot]).copied().unwrap_or_default();
            records.push(CheckRecord::new(
                field(0),
                field(1),
                field(2),
                field(3),
                field(4),
            ));
        }

        debug!(rows = records.len(), "parsed delimited artifact");
        Ok(records)
    }
}

impl Default for DelimitedReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileReader for DelimitedReader {
    async fn read(&self, bytes: &[u8]) -> ConnectorResult<Vec<CheckRecord>> {
        self.parse(bytes)
    }
}
