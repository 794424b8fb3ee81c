//! Task lifecycle tracking and the per-request cancellation signal.

use crate::plan::ExecutionPlan;
use prospector_collector::{CancelReason, CollectorResult};
use prospector_core::CollectorKind;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lifecycle state of one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// Waiting for a worker slot or its dependency
    Pending,
    /// A worker is executing it
    Running,
    /// Terminal; the result never changes again
    Finished(CollectorResult),
}

impl TaskState {
    /// Whether the task reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// State of every task in one run.
///
/// Each task moves `Pending -> Running -> Finished` (or straight from
/// `Pending` to `Finished` when skipped or cancelled) and is finished
/// exactly once.
#[derive(Debug)]
pub struct TaskTable {
    states: BTreeMap<CollectorKind, TaskState>,
}

impl TaskTable {
    /// All planned tasks, pending.
    #[must_use]
    pub fn new(plan: &ExecutionPlan) -> Self {
        Self {
            states: plan
                .tasks()
                .map(|t| (t.kind, TaskState::Pending))
                .collect(),
        }
    }

    /// Current state of `kind`.
    #[must_use]
    pub fn state(&self, kind: CollectorKind) -> Option<&TaskState> {
        self.states.get(&kind)
    }

    /// Move a pending task to running. Returns `false` if it was not pending.
    pub fn start(&mut self, kind: CollectorKind) -> bool {
        match self.states.get_mut(&kind) {
            Some(state) if matches!(state, TaskState::Pending) => {
                *state = TaskState::Running;
                true
            }
            _ => false,
        }
    }

    /// Record a task's terminal result. A second result for the same task
    /// is dropped and `false` returned.
    pub fn finish(&mut self, result: CollectorResult) -> bool {
        let kind = result.kind;
        match self.states.get_mut(&kind) {
            Some(TaskState::Finished(_)) => {
                warn!(kind = %kind, "task already finished; dropping second result");
                false
            }
            Some(state) => {
                info!(
                    kind = %kind,
                    status = result.status.label(),
                    attempts = result.attempts,
                    cost = %result.cost,
                    "task finished"
                );
                *state = TaskState::Finished(result);
                true
            }
            None => {
                warn!(kind = %kind, "result for unplanned task");
                false
            }
        }
    }

    /// Terminal result of `kind`, if finished.
    #[must_use]
    pub fn result(&self, kind: CollectorKind) -> Option<&CollectorResult> {
        match self.states.get(&kind) {
            Some(TaskState::Finished(result)) => Some(result),
            _ => None,
        }
    }

    /// Payload of `kind`, if it succeeded.
    #[must_use]
    pub fn payload(&self, kind: CollectorKind) -> Option<&Value> {
        self.result(kind)
            .filter(|r| r.is_success())
            .and_then(|r| r.payload.as_ref())
    }

    /// Whether `kind` is waiting to run.
    #[must_use]
    pub fn is_pending(&self, kind: CollectorKind) -> bool {
        matches!(self.states.get(&kind), Some(TaskState::Pending))
    }

    /// Kinds still pending.
    #[must_use]
    pub fn pending(&self) -> Vec<CollectorKind> {
        self.kinds_where(|s| matches!(s, TaskState::Pending))
    }

    /// Kinds currently running.
    #[must_use]
    pub fn running(&self) -> Vec<CollectorKind> {
        self.kinds_where(|s| matches!(s, TaskState::Running))
    }

    fn kinds_where(&self, f: impl Fn(&TaskState) -> bool) -> Vec<CollectorKind> {
        self.states
            .iter()
            .filter(|(_, s)| f(s))
            .map(|(k, _)| *k)
            .collect()
    }

    /// Whether every task is terminal.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.states.values().all(TaskState::is_terminal)
    }

    /// Terminal results, in kind order. Non-terminal tasks are left out.
    #[must_use]
    pub fn into_results(self) -> Vec<CollectorResult> {
        self.states
            .into_values()
            .filter_map(|s| match s {
                TaskState::Finished(result) => Some(result),
                TaskState::Pending | TaskState::Running => None,
            })
            .collect()
    }
}

/// Per-request cooperative cancellation.
///
/// The first `cancel` call decides the reason; later calls keep it.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancelSignal {
    /// A fresh, untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal linked to a caller's abort token: cancelling `parent` cancels
    /// this signal too.
    #[must_use]
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            reason: Arc::default(),
        }
    }

    /// Trigger cancellation.
    pub fn cancel(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Whether cancellation was triggered.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Why the signal fired. A token cancelled through its parent without a
    /// recorded reason counts as an abort.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        if !self.token.is_cancelled() {
            return None;
        }
        Some(self.reason.get().copied().unwrap_or(CancelReason::Aborted))
    }

    /// Underlying token, handed to collectors.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait until cancelled and return the reason.
    pub async fn cancelled(&self) -> CancelReason {
        self.token.cancelled().await;
        self.reason.get().copied().unwrap_or(CancelReason::Aborted)
    }
}
