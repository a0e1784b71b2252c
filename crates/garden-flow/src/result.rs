//! Run results.

use std::sync::Arc;

use crate::error::{RunError, TaskError};
use crate::progress::OutcomeKind;

/// Terminal state of a task in one run.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
  Succeeded,
  /// The skip predicate held; the body was never invoked.
  Skipped,
  Failed(Arc<TaskError>),
  /// The body was running when the run was cancelled and stopped early.
  Cancelled,
  /// The run stopped before this task could start.
  NotRun,
}

impl TaskOutcome {
  pub fn kind(&self) -> OutcomeKind {
    match self {
      TaskOutcome::Succeeded => OutcomeKind::Succeeded,
      TaskOutcome::Skipped => OutcomeKind::Skipped,
      TaskOutcome::Failed(_) => OutcomeKind::Failed,
      TaskOutcome::Cancelled => OutcomeKind::Cancelled,
      TaskOutcome::NotRun => OutcomeKind::NotRun,
    }
  }

  /// Whether dependents may treat this task as satisfied.
  pub fn is_satisfied(&self) -> bool {
    matches!(self, TaskOutcome::Succeeded | TaskOutcome::Skipped)
  }
}

/// Aggregate result of running an execution plan.
#[derive(Debug, Clone)]
pub struct RunResult {
  pub run_id: String,
  pub graph: String,
  /// Outcome of every task, in plan order.
  pub outcomes: Vec<(String, TaskOutcome)>,
  /// First failure observed, which decides overall failure.
  pub first_failure: Option<(String, Arc<TaskError>)>,
  pub cancelled: bool,
}

impl RunResult {
  /// True when every task that was not skipped succeeded.
  pub fn is_success(&self) -> bool {
    self.first_failure.is_none()
      && !self.cancelled
      && self.outcomes.iter().all(|(_, o)| o.is_satisfied())
  }

  pub fn outcome(&self, task: &str) -> Option<&TaskOutcome> {
    self
      .outcomes
      .iter()
      .find(|(name, _)| name == task)
      .map(|(_, outcome)| outcome)
  }

  /// Names of tasks with the given outcome kind, in plan order.
  pub fn tasks_with(&self, kind: OutcomeKind) -> Vec<&str> {
    self
      .outcomes
      .iter()
      .filter(|(_, o)| o.kind() == kind)
      .map(|(name, _)| name.as_str())
      .collect()
  }

  pub fn into_result(self) -> Result<(), RunError> {
    if let Some((task, source)) = self.first_failure {
      return Err(RunError::TaskFailed { task, source });
    }
    if self.cancelled || !self.outcomes.iter().all(|(_, o)| o.is_satisfied()) {
      return Err(RunError::Cancelled);
    }
    Ok(())
  }
}
