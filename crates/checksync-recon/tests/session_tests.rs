//! Session Coordinator Tests
//!
//! End-to-end coverage of the reconciliation session lifecycle against
//! mock collaborators: classification hand-off, operator resolution,
//! single-flight enforcement, write-back ordering and halt-on-failure,
//! and the error latch with timed recovery.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use checksync_connector::delimited::DelimitedReader;
use checksync_connector::error::{ConnectorError, ConnectorResult};
use checksync_connector::traits::{FileReader, GridExtractor, Presenter, RecordWriter};
use checksync_connector::types::ResolutionView;
use checksync_core::record::CheckRecord;
use checksync_recon::config::ReconConfig;
use checksync_recon::session::{SessionCoordinator, SessionError};
use checksync_recon::workflow::{WorkflowObserver, WorkflowState};

// =============================================================================
// Mock Collaborators
// =============================================================================

/// How the mock grid behaves on extract.
#[derive(Debug, Clone, Copy)]
enum GridBehavior {
    Success,
    NotFound,
    Empty,
}

struct TestGrid {
    rows: Vec<CheckRecord>,
    behavior: GridBehavior,
    extract_calls: AtomicUsize,
}

impl TestGrid {
    fn new(rows: Vec<CheckRecord>) -> Self {
        Self {
            rows,
            behavior: GridBehavior::Success,
            extract_calls: AtomicUsize::new(0),
        }
    }

    fn with_behavior(mut self, behavior: GridBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GridExtractor for TestGrid {
    async fn extract(&self) -> ConnectorResult<Vec<CheckRecord>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            GridBehavior::Success => Ok(self.rows.clone()),
            GridBehavior::NotFound => Err(ConnectorError::SourceNotFound {
                message: "grid element missing".to_string(),
            }),
            GridBehavior::Empty => Err(ConnectorError::EmptySource),
        }
    }
}

#[derive(Default)]
struct TestPresenter {
    present_calls: AtomicUsize,
    last_view: Mutex<Option<ResolutionView>>,
    fail: bool,
}

impl TestPresenter {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn last_view(&self) -> Option<ResolutionView> {
        self.last_view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Presenter for TestPresenter {
    async fn present(&self, view: &ResolutionView) -> ConnectorResult<()> {
        self.present_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ConnectorError::PresentationFailed {
                message: "window blocked".to_string(),
            });
        }
        *self
            .last_view
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(view.clone());
        Ok(())
    }
}

struct TestWriter {
    /// Fail the apply call with this zero-based index, if set.
    fail_at: Option<usize>,
    /// Per-record delay, for catching the coordinator mid-write.
    delay: Option<Duration>,
    apply_calls: AtomicUsize,
    applied: Mutex<Vec<String>>,
}

impl TestWriter {
    fn new() -> Self {
        Self {
            fail_at: None,
            delay: None,
            apply_calls: AtomicUsize::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::new()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    fn applied(&self) -> Vec<String> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RecordWriter for TestWriter {
    async fn apply_one(&self, record: &CheckRecord) -> ConnectorResult<()> {
        let call = self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_at == Some(call) {
            return Err(ConnectorError::WriteFailed {
                check_id: record.check_id.clone(),
                reason: "cell rejected input".to_string(),
            });
        }
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.check_id.clone());
        Ok(())
    }
}

#[derive(Default)]
struct CountingObserver {
    error_notifications: AtomicUsize,
}

impl CountingObserver {
    fn errors(&self) -> usize {
        self.error_notifications.load(Ordering::SeqCst)
    }
}

impl WorkflowObserver for CountingObserver {
    fn state_changed(
        &self,
        _old: WorkflowState,
        new: WorkflowState,
        _details: Option<&serde_json::Value>,
    ) {
        if new == WorkflowState::Error {
            self.error_notifications.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn record(description: &str, status: &str, reference: &str, id: &str) -> CheckRecord {
    CheckRecord::new(description, status, "", reference, id)
}

/// Build a tab-delimited artifact from (description, status, comments,
/// reference, id) rows.
fn tsv(rows: &[[&str; 5]]) -> Vec<u8> {
    let mut text = String::from(
        "Check Description\tTask Status\tTechnician Comments\tManual Reference\tCheck ID\n",
    );
    for row in rows {
        text.push_str(&row.join("\t"));
        text.push('\n');
    }
    text.into_bytes()
}

struct Harness {
    coordinator: Arc<SessionCoordinator>,
    grid: Arc<TestGrid>,
    presenter: Arc<TestPresenter>,
    writer: Arc<TestWriter>,
    observer: Arc<CountingObserver>,
}

fn harness(grid: TestGrid, presenter: TestPresenter, writer: TestWriter) -> Harness {
    let grid = Arc::new(grid);
    let presenter = Arc::new(presenter);
    let writer = Arc::new(writer);
    let observer = Arc::new(CountingObserver::default());
    let config = ReconConfig {
        recovery_delay_ms: 30,
    };
    let coordinator = Arc::new(SessionCoordinator::new(
        grid.clone(),
        Arc::new(DelimitedReader::new()),
        presenter.clone(),
        writer.clone(),
        &config,
    ));
    coordinator.workflow().add_observer(observer.clone());
    Harness {
        coordinator,
        grid,
        presenter,
        writer,
        observer,
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn session_classifies_and_presents_buckets() {
    let cloud = vec![
        record("Inspect", "Pass", "R1", "C1"),
        record("Drain", "Fail", "R2", "C2"),
    ];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());
    let file = tsv(&[["Inspect", "Pass", "", "R1", "C1"]]);

    h.coordinator.start_session(Some(&file)).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");

    let view = h.presenter.last_view().expect("presented");
    assert_eq!(view.matching.len(), 1);
    assert!(view.conflicting.is_empty());
    assert!(view.missing_in_cloud.is_empty());
    assert_eq!(view.missing_in_file.len(), 1);
    assert_eq!(view.missing_in_file[0].record.check_id, "C2");
    assert!(!view.is_fully_matched());
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Reviewing);
}

#[tokio::test]
async fn resolved_records_write_back_and_the_session_finishes() {
    let cloud = vec![record("Inspect", "Fail", "R1", "C2")];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());
    let file = tsv(&[["Inspect", "Pass", "", "R1", "C1"]]);

    h.coordinator.start_session(Some(&file)).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");

    let view = h.presenter.last_view().expect("presented");
    assert_eq!(view.conflicting.len(), 1);
    let resolved = h
        .coordinator
        .resolve_conflict(view.conflicting[0].id, "Pass", "ok")
        .expect("resolve");
    // Identity from the cloud side, payload from the operator.
    assert_eq!(resolved.check_id, "C2");
    assert_eq!(resolved.task_status, "Pass");

    let approved = h.coordinator.approved_records();
    let written = h
        .coordinator
        .request_write_back(approved)
        .await
        .expect("write back");
    assert_eq!(written, 1);
    assert_eq!(h.writer.applied(), vec!["C2"]);
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Idle);
    // Session data is released on return to idle.
    assert!(h.coordinator.session_id().is_none());
    assert_eq!(h.observer.errors(), 0);
}

#[tokio::test]
async fn write_back_follows_approval_order_not_bucket_order() {
    let cloud = vec![
        record("Inspect", "Fail", "R1", "C9"),
        record("Drain", "Fail", "R2", "C8"),
    ];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());
    let file = tsv(&[
        ["Inspect", "Pass", "", "R1", "C1"],
        ["Drain", "Pass", "", "R2", "C2"],
    ]);

    h.coordinator.start_session(Some(&file)).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");
    let view = h.presenter.last_view().expect("presented");
    assert_eq!(view.conflicting.len(), 2);

    // Approve in reverse bucket order.
    h.coordinator
        .resolve_conflict(view.conflicting[1].id, "Pass", "")
        .expect("resolve");
    h.coordinator
        .resolve_conflict(view.conflicting[0].id, "Pass", "")
        .expect("resolve");

    let approved = h.coordinator.approved_records();
    h.coordinator
        .request_write_back(approved)
        .await
        .expect("write back");
    assert_eq!(h.writer.applied(), vec!["C8", "C9"]);
}

#[tokio::test]
async fn missing_records_can_be_resolved_into_the_approved_set() {
    let cloud = vec![record("Inspect", "Fail", "R1", "C1")];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());

    // No file uploaded: every cloud record is missing from the file.
    h.coordinator.start_session(None).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");

    let view = h.presenter.last_view().expect("presented");
    assert_eq!(view.missing_in_file.len(), 1);
    let resolved = h
        .coordinator
        .resolve_missing(view.missing_in_file[0].id, "Pass", "verified")
        .expect("resolve");
    assert_eq!(resolved.technician_comments, "verified");

    let approved = h.coordinator.approved_records();
    h.coordinator
        .request_write_back(approved)
        .await
        .expect("write back");
    assert_eq!(h.writer.applied(), vec!["C1"]);
}

// =============================================================================
// Single-flight and phase guards
// =============================================================================

#[tokio::test]
async fn second_start_is_rejected_without_touching_the_extractor() {
    let cloud = vec![record("Inspect", "Pass", "R1", "C1")];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());

    h.coordinator.start_session(None).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");

    let err = h.coordinator.start_session(None).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::SessionActive {
            state: WorkflowState::Reviewing
        }
    ));
    assert_eq!(h.grid.extract_calls(), 1);
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Reviewing);
    assert_eq!(h.observer.errors(), 0);
}

#[tokio::test]
async fn resolution_outside_review_is_rejected_inline() {
    let cloud = vec![record("Inspect", "Fail", "R1", "C2")];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());
    let file = tsv(&[["Inspect", "Pass", "", "R1", "C1"]]);

    h.coordinator.start_session(Some(&file)).await.expect("start");
    // Still extracting; the resolution surface is not open yet.
    let view = h.coordinator.current_view().expect("session data");
    let err = h
        .coordinator
        .resolve_conflict(view.conflicting[0].id, "Pass", "")
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidPhase { .. }));
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Extracting);
    assert_eq!(h.observer.errors(), 0);
}

#[tokio::test]
async fn empty_approval_list_is_a_no_op() {
    let cloud = vec![record("Inspect", "Pass", "R1", "C1")];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());

    h.coordinator.start_session(None).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");

    let written = h
        .coordinator
        .request_write_back(Vec::new())
        .await
        .expect("no-op");
    assert_eq!(written, 0);
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Reviewing);
    assert_eq!(h.writer.apply_calls(), 0);
}

// =============================================================================
// Validation stays inline
// =============================================================================

#[tokio::test]
async fn empty_status_never_reaches_the_workflow() {
    let cloud = vec![record("Inspect", "Fail", "R1", "C2")];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());
    let file = tsv(&[["Inspect", "Pass", "", "R1", "C1"]]);

    h.coordinator.start_session(Some(&file)).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");
    let view = h.presenter.last_view().expect("presented");

    let err = h
        .coordinator
        .resolve_conflict(view.conflicting[0].id, "", "note")
        .unwrap_err();
    assert!(matches!(err, SessionError::Ledger(_)));
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Reviewing);
    assert_eq!(h.observer.errors(), 0);
}

// =============================================================================
// Faults, latch, recovery
// =============================================================================

#[tokio::test]
async fn empty_grid_aborts_cleanly_to_idle() {
    let h = harness(
        TestGrid::new(Vec::new()).with_behavior(GridBehavior::Empty),
        TestPresenter::default(),
        TestWriter::new(),
    );

    let err = h.coordinator.start_session(None).await.unwrap_err();
    assert!(matches!(err, SessionError::NoSourceRows));
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Idle);
    // A defined empty-result path, not a fault.
    assert_eq!(h.observer.errors(), 0);
}

#[tokio::test]
async fn missing_grid_faults_and_recovers_to_idle() {
    let h = harness(
        TestGrid::new(Vec::new()).with_behavior(GridBehavior::NotFound),
        TestPresenter::default(),
        TestWriter::new(),
    );

    let err = h.coordinator.start_session(None).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Connector(ConnectorError::SourceNotFound { .. })
    ));
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Error);
    assert_eq!(h.observer.errors(), 1);
    assert!(h.coordinator.session_id().is_none());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Idle);
}

#[tokio::test]
async fn invalid_file_faults_the_workflow() {
    let cloud = vec![record("Inspect", "Pass", "R1", "C1")];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());
    let file = b"Check Description\tTask Status\nInspect\tPass\n";

    let err = h.coordinator.start_session(Some(file)).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Connector(ConnectorError::InvalidFormat { .. })
    ));
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Error);
    assert_eq!(h.observer.errors(), 1);
}

#[tokio::test]
async fn presenter_failure_faults_the_workflow() {
    let cloud = vec![record("Inspect", "Pass", "R1", "C1")];
    let h = harness(TestGrid::new(cloud), TestPresenter::failing(), TestWriter::new());

    h.coordinator.start_session(None).await.expect("start");
    let err = h.coordinator.open_for_resolution().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Connector(ConnectorError::PresentationFailed { .. })
    ));
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Error);
}

#[tokio::test]
async fn write_failure_halts_the_sequence_and_keeps_earlier_writes() {
    let cloud = vec![
        record("A", "Fail", "R1", "C1"),
        record("B", "Fail", "R2", "C2"),
        record("C", "Fail", "R3", "C3"),
    ];
    let h = harness(
        TestGrid::new(cloud),
        TestPresenter::default(),
        TestWriter::failing_at(1),
    );

    h.coordinator.start_session(None).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");
    let view = h.presenter.last_view().expect("presented");
    for missing in &view.missing_in_file {
        h.coordinator
            .resolve_missing(missing.id, "Pass", "")
            .expect("resolve");
    }

    let approved = h.coordinator.approved_records();
    let err = h.coordinator.request_write_back(approved).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Connector(ConnectorError::WriteFailed { .. })
    ));
    // First record applied, second failed, third never attempted.
    assert_eq!(h.writer.applied(), vec!["C1"]);
    assert_eq!(h.writer.apply_calls(), 2);
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Error);
    assert_eq!(h.observer.errors(), 1);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Idle);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn cancel_during_review_returns_to_idle_and_discards_data() {
    let cloud = vec![record("Inspect", "Pass", "R1", "C1")];
    let h = harness(TestGrid::new(cloud), TestPresenter::default(), TestWriter::new());

    h.coordinator.start_session(None).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");
    h.coordinator.cancel().expect("cancel");

    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Idle);
    assert!(h.coordinator.session_id().is_none());

    // A fresh session can start after cancellation.
    h.coordinator.start_session(None).await.expect("restart");
    assert_eq!(h.grid.extract_calls(), 2);
}

#[tokio::test]
async fn cancel_is_rejected_once_write_back_has_begun() {
    let cloud = vec![record("A", "Fail", "R1", "C1"), record("B", "Fail", "R2", "C2")];
    let h = harness(
        TestGrid::new(cloud),
        TestPresenter::default(),
        TestWriter::slow(Duration::from_millis(50)),
    );

    h.coordinator.start_session(None).await.expect("start");
    h.coordinator.open_for_resolution().await.expect("open");
    let view = h.presenter.last_view().expect("presented");
    for missing in &view.missing_in_file {
        h.coordinator
            .resolve_missing(missing.id, "Pass", "")
            .expect("resolve");
    }

    let approved = h.coordinator.approved_records();
    let coordinator = h.coordinator.clone();
    let write = tokio::spawn(async move { coordinator.request_write_back(approved).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    let err = h.coordinator.cancel().unwrap_err();
    assert!(matches!(err, SessionError::WriteBackInProgress));

    let written = write.await.expect("join").expect("write back");
    assert_eq!(written, 2);
    assert_eq!(h.coordinator.workflow().state(), WorkflowState::Idle);
}
