//! checksync Connector Framework
//!
//! Contracts for the four collaborators at the edge of a reconciliation
//! session, plus one concrete file connector:
//!
//! - [`traits::GridExtractor`] - pulls check records out of the live grid
//! - [`traits::FileReader`] - parses an uploaded artifact into records
//! - [`traits::Presenter`] - renders buckets and collects operator events
//! - [`traits::RecordWriter`] - applies approved records back to the grid
//!
//! The reconciliation core only ever sees these traits; locating grid
//! cells, file parsing details, and rendering live behind them.

pub mod delimited;
pub mod error;
pub mod traits;
pub mod types;

pub use delimited::{DelimitedReader, DelimitedReaderConfig};
pub use error::{ConnectorError, ConnectorResult};
pub use traits::{FileReader, GridExtractor, Presenter, RecordWriter};
pub use types::{ConflictView, MissingView, ResolutionView, REQUIRED_COLUMNS};
