//! Workflow state machine
//!
//! Governs one reconciliation session's lifecycle and the error/recovery
//! contract. The machine is an explicit per-session object with injected
//! observers; there is no process-wide state.
//!
//! ```text
//! Idle -> Extracting -> Reviewing -> Staging -> Writing -> Idle
//!           |              |
//!           +-> Idle       +-> Idle          any state -> Error -> Idle
//! ```
//!
//! A fault from any state latches `Error`: the first fault is surfaced to
//! observers exactly once, later faults are suppressed until the machine
//! returns to `Idle`. Recovery to `Idle` is scheduled automatically after
//! a configurable delay and cancelled if `Idle` is reached another way.

use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle states of a reconciliation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// No session active.
    Idle,
    /// Pulling records from the live grid and the uploaded file.
    Extracting,
    /// Buckets are in front of the operator for resolution.
    Reviewing,
    /// Approved records collected for write-back.
    Staging,
    /// Applying approved records to the live source.
    Writing,
    /// A fault is latched; the machine will recover to idle.
    Error,
}

impl WorkflowState {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Extracting => "extracting",
            WorkflowState::Reviewing => "reviewing",
            WorkflowState::Staging => "staging",
            WorkflowState::Writing => "writing",
            WorkflowState::Error => "error",
        }
    }

    /// Whether the transition table permits moving to `to` from here.
    ///
    /// Faulting into `Error` is legal from every state; `Idle` is the
    /// only exit from `Error`.
    #[must_use]
    pub fn can_transition_to(self, to: WorkflowState) -> bool {
        use WorkflowState::{Extracting, Idle, Reviewing, Staging, Writing};
        if to == WorkflowState::Error {
            return true;
        }
        matches!(
            (self, to),
            (Idle, Extracting)
                | (Extracting, Reviewing | Idle)
                | (Reviewing, Staging | Idle)
                | (Staging, Writing)
                | (Writing, Idle)
                | (WorkflowState::Error, Idle)
        )
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from workflow transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// The requested transition is not in the table.
    #[error("invalid workflow transition: {from} -> {to}")]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
}

/// Passive observer of workflow activity.
///
/// Observers are notified after the fact and cannot block or alter a
/// transition.
pub trait WorkflowObserver: Send + Sync {
    /// A transition completed. `details` carries the fault description
    /// when the new state is [`WorkflowState::Error`].
    fn state_changed(
        &self,
        old: WorkflowState,
        new: WorkflowState,
        details: Option<&JsonValue>,
    );

    /// Progress within the current state (extraction rows, records
    /// written).
    fn progress(&self, current: usize, total: usize, status: &str) {
        let _ = (current, total, status);
    }
}

/// The per-session workflow machine.
pub struct Workflow {
    state: Mutex<WorkflowState>,
    recovery: Mutex<Option<JoinHandle<()>>>,
    observers: RwLock<Vec<Arc<dyn WorkflowObserver>>>,
    recovery_delay: Duration,
    me: Weak<Workflow>,
}

impl Workflow {
    /// Create a machine in `Idle` with the given error-recovery delay.
    #[must_use]
    pub fn new(recovery_delay: Duration) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            state: Mutex::new(WorkflowState::Idle),
            recovery: Mutex::new(None),
            observers: RwLock::new(Vec::new()),
            recovery_delay,
            me: me.clone(),
        })
    }

    /// Register an observer. Observers registered after activity has
    /// started only see subsequent notifications.
    pub fn add_observer(&self, observer: Arc<dyn WorkflowObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        *self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a fault is currently latched.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.state() == WorkflowState::Error
    }

    /// Request a transition.
    ///
    /// A request not present in the table returns
    /// [`WorkflowError::InvalidTransition`] and is additionally reported
    /// as a fault: the machine routes to `Error` (the requested target is
    /// never entered). Requesting `Error` directly is the same as
    /// [`Workflow::fault`] with a generic description.
    pub fn transition(&self, to: WorkflowState) -> Result<(), WorkflowError> {
        if to == WorkflowState::Error {
            self.fault("unspecified fault");
            return Ok(());
        }

        let old = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let old = *state;
            if !old.can_transition_to(to) {
                drop(state);
                self.fault(&format!("invalid workflow transition: {old} -> {to}"));
                return Err(WorkflowError::InvalidTransition { from: old, to });
            }
            *state = to;
            old
        };

        if to == WorkflowState::Idle {
            self.cancel_recovery();
        }

        info!(from = %old, to = %to, "workflow state changed");
        self.notify_state(old, to, None);
        Ok(())
    }

    /// Transition only if the machine is currently in `from`.
    ///
    /// Returns whether the transition was applied. Used as the atomic
    /// single-flight guard: a losing caller sees `false` and no state
    /// change, not a fault.
    pub fn try_transition(&self, from: WorkflowState, to: WorkflowState) -> bool {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != from || !from.can_transition_to(to) {
                return false;
            }
            *state = to;
        }

        if to == WorkflowState::Idle {
            self.cancel_recovery();
        }

        info!(from = %from, to = %to, "workflow state changed");
        self.notify_state(from, to, None);
        true
    }

    /// Report a fault. Always legal; latches `Error` and schedules
    /// automatic recovery to `Idle`.
    ///
    /// First fault wins: while the latch holds, further reports are
    /// suppressed rather than queued, and observers hear nothing.
    pub fn fault(&self, description: &str) {
        let old = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == WorkflowState::Error {
                debug!(description, "fault suppressed; error already latched");
                return;
            }
            let old = *state;
            *state = WorkflowState::Error;
            old
        };

        warn!(from = %old, description, "workflow fault");
        self.schedule_recovery();
        self.notify_state(old, WorkflowState::Error, Some(&json!({ "error": description })));
    }

    /// Send a progress update to observers.
    pub fn notify_progress(&self, current: usize, total: usize, status: &str) {
        for observer in self.observer_snapshot() {
            observer.progress(current, total, status);
        }
    }

    fn schedule_recovery(&self) {
        let delay = self.recovery_delay;
        let me = self.me.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(workflow) = me.upgrade() {
                debug!("workflow recovering to idle");
                let _ = workflow.transition(WorkflowState::Idle);
            }
        });

        if let Ok(mut slot) = self.recovery.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    fn cancel_recovery(&self) {
        if let Ok(mut slot) = self.recovery.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    fn notify_state(
        &self,
        old: WorkflowState,
        new: WorkflowState,
        details: Option<&JsonValue>,
    ) {
        for observer in self.observer_snapshot() {
            observer.state_changed(old, new, details);
        }
    }

    fn observer_snapshot(&self) -> Vec<Arc<dyn WorkflowObserver>> {
        self.observers
            .read()
            .map(|observers| observers.clone())
            .unwrap_or_default()
    }
}

impl Drop for Workflow {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.recovery.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
