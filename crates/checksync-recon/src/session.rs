//! Session coordinator
//!
//! Owns one active reconciliation session's data and mediates between the
//! workflow machine, the reconciliation engine, the resolution ledger and
//! the four collaborators. One session at a time, system-wide: the
//! workflow machine enforces it structurally and `start_session` carries
//! an explicit single-flight guard against re-entrant triggers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use checksync_connector::error::ConnectorError;
use checksync_connector::traits::{FileReader, GridExtractor, Presenter, RecordWriter};
use checksync_connector::types::ResolutionView;
use checksync_core::ids::{EntryId, PairId, SessionId};
use checksync_core::record::CheckRecord;

use crate::config::ReconConfig;
use crate::engine::classify;
use crate::ledger::{LedgerError, ResolutionLedger};
use crate::statistics::SessionStats;
use crate::workflow::{Workflow, WorkflowError, WorkflowState};

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A session is already active; the new start was rejected without
    /// touching the workflow or the extractor.
    #[error("a session is already active (state: {state})")]
    SessionActive { state: WorkflowState },

    /// No session data is present.
    #[error("no active session")]
    NoActiveSession,

    /// The operation is not permitted in the current workflow state.
    #[error("operation not permitted while {state}")]
    InvalidPhase { state: WorkflowState },

    /// The source grid yielded no rows; the session aborted cleanly back
    /// to idle. Not a fault.
    #[error("source grid produced no rows")]
    NoSourceRows,

    /// Cancellation is not supported once write-back has begun; the
    /// in-flight sequence runs to completion or faults.
    #[error("write-back in progress; cancellation is not supported")]
    WriteBackInProgress,

    /// A collaborator fault; the workflow has latched it.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// A workflow ordering fault; the workflow has latched it.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A recoverable resolution error, reported inline.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// One session's data; created when extraction completes, discarded when
/// the workflow returns to idle.
struct Session {
    id: SessionId,
    started_at: DateTime<Utc>,
    ledger: ResolutionLedger,
    stats: SessionStats,
}

/// Coordinator for the extract -> classify -> resolve -> write-back
/// lifecycle.
pub struct SessionCoordinator {
    workflow: Arc<Workflow>,
    extractor: Arc<dyn GridExtractor>,
    file_reader: Arc<dyn FileReader>,
    presenter: Arc<dyn Presenter>,
    writer: Arc<dyn RecordWriter>,
    session: Mutex<Option<Session>>,
}

impl SessionCoordinator {
    /// Create a coordinator with its own workflow machine.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn GridExtractor>,
        file_reader: Arc<dyn FileReader>,
        presenter: Arc<dyn Presenter>,
        writer: Arc<dyn RecordWriter>,
        config: &ReconConfig,
    ) -> Self {
        Self {
            workflow: Workflow::new(config.recovery_delay()),
            extractor,
            file_reader,
            presenter,
            writer,
            session: Mutex::new(None),
        }
    }

    /// The coordinator's workflow machine, for observer registration and
    /// state inspection.
    #[must_use]
    pub fn workflow(&self) -> &Arc<Workflow> {
        &self.workflow
    }

    /// Start a session: extract from the grid, read the uploaded file if
    /// one was supplied, classify, and build the resolution ledger.
    ///
    /// Only permitted from idle. An empty grid aborts cleanly back to
    /// idle ([`SessionError::NoSourceRows`]); an extractor or reader
    /// fault latches the workflow error.
    #[instrument(skip(self, file_bytes))]
    pub async fn start_session(&self, file_bytes: Option<&[u8]>) -> SessionResult<SessionId> {
        if !self
            .workflow
            .try_transition(WorkflowState::Idle, WorkflowState::Extracting)
        {
            let state = self.workflow.state();
            warn!(%state, "session start rejected; workflow not idle");
            return Err(SessionError::SessionActive { state });
        }

        let cloud_records = match self.extractor.extract().await {
            Ok(records) => records,
            Err(err) if err.is_empty_result() => {
                info!("source grid has no rows; aborting session");
                let _ = self.workflow.transition(WorkflowState::Idle);
                return Err(SessionError::NoSourceRows);
            }
            Err(err) => return Err(self.abort_with_fault(err)),
        };
        self.workflow
            .notify_progress(cloud_records.len(), cloud_records.len(), "extracted");

        let file_records = match file_bytes {
            Some(bytes) => match self.file_reader.read(bytes).await {
                Ok(records) => records,
                Err(err) => return Err(self.abort_with_fault(err)),
            },
            None => Vec::new(),
        };

        let classification = classify(&file_records, &cloud_records);
        let stats = SessionStats::from_classification(&classification);
        let session = Session {
            id: SessionId::new(),
            started_at: Utc::now(),
            ledger: ResolutionLedger::new(classification),
            stats,
        };
        let id = session.id;
        info!(
            session_id = %id,
            cloud = session.stats.cloud_records,
            file = session.stats.file_records,
            matching = session.stats.matching,
            conflicting = session.stats.conflicting,
            "session started"
        );
        *self.lock_session() = Some(session);
        Ok(id)
    }

    /// Hand the buckets and resolution handles to the presenter.
    #[instrument(skip(self))]
    pub async fn open_for_resolution(&self) -> SessionResult<()> {
        let view = {
            let guard = self.lock_session();
            let session = guard.as_ref().ok_or(SessionError::NoActiveSession)?;
            session.ledger.view()
        };

        self.workflow.transition(WorkflowState::Reviewing)?;

        if let Err(err) = self.presenter.present(&view).await {
            return Err(self.abort_with_fault(err));
        }
        Ok(())
    }

    /// Apply an operator decision to a conflicting pair. Recoverable
    /// errors are returned inline and never touch the workflow.
    pub fn resolve_conflict(
        &self,
        pair_id: PairId,
        task_status: &str,
        technician_comments: &str,
    ) -> SessionResult<CheckRecord> {
        self.require_reviewing()?;
        let mut guard = self.lock_session();
        let session = guard.as_mut().ok_or(SessionError::NoActiveSession)?;
        let record = session
            .ledger
            .resolve_conflict(pair_id, task_status, technician_comments)?;
        session.stats.record_resolution();
        Ok(record)
    }

    /// Apply an operator decision to a missing-in-file record.
    pub fn resolve_missing(
        &self,
        entry_id: EntryId,
        task_status: &str,
        technician_comments: &str,
    ) -> SessionResult<CheckRecord> {
        self.require_reviewing()?;
        let mut guard = self.lock_session();
        let session = guard.as_mut().ok_or(SessionError::NoActiveSession)?;
        let record = session
            .ledger
            .resolve_missing(entry_id, task_status, technician_comments)?;
        session.stats.record_resolution();
        Ok(record)
    }

    /// Write the approved records back to the live source, sequentially,
    /// in approval order.
    ///
    /// An empty list is a no-op that stays in review. The sequence halts
    /// on the first write failure: earlier records stay applied (write-
    /// back is atomic per record, not transactional across records) and
    /// the workflow latches the fault. Completing every record finishes
    /// the session.
    #[instrument(skip(self, approved))]
    pub async fn request_write_back(&self, approved: Vec<CheckRecord>) -> SessionResult<usize> {
        if approved.is_empty() {
            debug!("write-back requested with no approved records; staying in review");
            return Ok(0);
        }

        if !self
            .workflow
            .try_transition(WorkflowState::Reviewing, WorkflowState::Staging)
        {
            let state = self.workflow.state();
            return Err(SessionError::InvalidPhase { state });
        }

        let total = approved.len();
        if let Some(session) = self.lock_session().as_mut() {
            session.stats.records_to_write = total;
            session.stats.records_written = 0;
        }
        self.workflow.notify_progress(0, total, "staging");
        self.workflow.transition(WorkflowState::Writing)?;

        for (index, record) in approved.iter().enumerate() {
            if let Err(err) = self.writer.apply_one(record).await {
                warn!(
                    check_id = %record.check_id,
                    applied = index,
                    total,
                    "write-back halted on first failure"
                );
                return Err(self.abort_with_fault(err));
            }
            if let Some(session) = self.lock_session().as_mut() {
                session.stats.records_written = index + 1;
            }
            self.workflow.notify_progress(index + 1, total, "writing");
        }

        self.finish_session()?;
        Ok(total)
    }

    /// Conclude a fully written session: return to idle and release the
    /// session data.
    pub fn finish_session(&self) -> SessionResult<()> {
        self.workflow.transition(WorkflowState::Idle)?;
        if let Some(session) = self.lock_session().take() {
            let elapsed = Utc::now()
                .signed_duration_since(session.started_at)
                .num_seconds();
            info!(
                session_id = %session.id,
                written = session.stats.records_written,
                resolutions = session.stats.resolutions_applied,
                elapsed_seconds = elapsed,
                "session finished"
            );
        }
        Ok(())
    }

    /// Cancel the session (resolution surface torn down).
    ///
    /// Valid while extracting or reviewing, and while the error latch
    /// holds (which cancels the pending automatic recovery). Rejected
    /// once write-back has begun.
    pub fn cancel(&self) -> SessionResult<()> {
        let state = self.workflow.state();
        match state {
            WorkflowState::Idle => Ok(()),
            WorkflowState::Extracting | WorkflowState::Reviewing | WorkflowState::Error => {
                self.workflow.transition(WorkflowState::Idle)?;
                if let Some(session) = self.lock_session().take() {
                    info!(session_id = %session.id, "session cancelled");
                }
                Ok(())
            }
            WorkflowState::Staging | WorkflowState::Writing => {
                Err(SessionError::WriteBackInProgress)
            }
        }
    }

    /// Snapshot of the active session's buckets, if any.
    #[must_use]
    pub fn current_view(&self) -> Option<ResolutionView> {
        self.lock_session().as_ref().map(|s| s.ledger.view())
    }

    /// Records approved so far, in the order write-back will use.
    #[must_use]
    pub fn approved_records(&self) -> Vec<CheckRecord> {
        self.lock_session()
            .as_ref()
            .map(|s| s.ledger.approved_records().to_vec())
            .unwrap_or_default()
    }

    /// Statistics of the active session, if any.
    #[must_use]
    pub fn stats(&self) -> Option<SessionStats> {
        self.lock_session().as_ref().map(|s| s.stats.clone())
    }

    /// Identifier of the active session, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock_session().as_ref().map(|s| s.id)
    }

    fn require_reviewing(&self) -> SessionResult<()> {
        let state = self.workflow.state();
        if state != WorkflowState::Reviewing {
            return Err(SessionError::InvalidPhase { state });
        }
        Ok(())
    }

    /// Latch a collaborator fault and drop the session data.
    fn abort_with_fault(&self, err: ConnectorError) -> SessionError {
        self.workflow.fault(&err.to_string());
        *self.lock_session() = None;
        SessionError::Connector(err)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
