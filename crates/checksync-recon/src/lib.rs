//! # checksync Reconciliation Engine
//!
//! Classification of check records between a live cloud grid and an
//! uploaded file, and the operator workflow that resolves conflicts and
//! writes approved records back.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SessionCoordinator                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌────────────┐    ┌──────────────────┐    ┌────────────┐   │
//! │  │   Engine   │───►│ ResolutionLedger │───►│   Writer   │   │
//! │  │ (classify) │    │ (operator moves) │    │ (external) │   │
//! │  └────────────┘    └──────────────────┘    └────────────┘   │
//! │        ▲                    │                    │          │
//! │        │                    ▼                    ▼          │
//! │  ┌────────────┐    ┌──────────────────┐    ┌────────────┐   │
//! │  │ Extractor/ │    │    Presenter     │    │  Workflow  │   │
//! │  │ FileReader │    │    (external)    │    │  machine   │   │
//! │  └────────────┘    └──────────────────┘    └────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! One session at a time: `Idle -> Extracting -> Reviewing -> Staging ->
//! Writing -> Idle`, with a first-fault-wins error latch and timed
//! recovery. Collaborators (grid extractor, file reader, presenter,
//! record writer) live behind the `checksync-connector` traits.

pub mod config;
pub mod engine;
pub mod ledger;
pub mod session;
pub mod statistics;
pub mod workflow;

// Re-exports for convenience
pub use config::ReconConfig;
pub use engine::{classify, Classification, ConflictPair};
pub use ledger::{LedgerError, LedgerResult, ResolutionLedger};
pub use session::{SessionCoordinator, SessionError, SessionResult};
pub use statistics::SessionStats;
pub use workflow::{Workflow, WorkflowError, WorkflowObserver, WorkflowState};
