//! Error types for graph compilation and task execution.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by task bodies and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while building or compiling a graph.
///
/// These are always surfaced before any task runs and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
  /// A task with the same name was already added.
  #[error("duplicate task name: {name}")]
  DuplicateName { name: String },

  /// A task declares a dependency that is not part of the graph.
  #[error("task '{task}' depends on unknown task '{dependency}'")]
  UnknownDependency { task: String, dependency: String },

  /// The dependency relation contains a cycle.
  ///
  /// `path` lists the tasks on the cycle with the first one repeated at the end.
  #[error("dependency cycle detected: {}", path.join(" -> "))]
  Cycle { path: Vec<String> },
}

/// Failure of a single task body.
#[derive(Debug, Error)]
pub enum TaskError {
  /// The body observed cancellation and stopped early.
  #[error("task cancelled")]
  Cancelled,

  /// The body returned an error.
  #[error("{source}")]
  Failed {
    #[source]
    source: BoxError,
  },

  /// The body panicked.
  #[error("task panicked: {message}")]
  Panicked { message: String },
}

impl TaskError {
  /// Wrap any error as a task failure.
  pub fn failed(err: impl Into<BoxError>) -> Self {
    TaskError::Failed { source: err.into() }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, TaskError::Cancelled)
  }
}

/// Terminal error of a run, derived from a [`RunResult`](crate::RunResult).
#[derive(Debug, Clone, Error)]
pub enum RunError {
  /// A task failed; this is the first failure observed.
  #[error("task '{task}' failed: {source}")]
  TaskFailed {
    task: String,
    #[source]
    source: Arc<TaskError>,
  },

  /// The run was cancelled before all tasks reached a terminal state.
  #[error("run cancelled")]
  Cancelled,
}
