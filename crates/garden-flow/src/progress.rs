//! Progress events and reporters.
//!
//! The executor reports one event per task once it reaches a terminal state.
//! Reporters are called from the executor's scheduling loop only, never
//! concurrently with themselves.

use tokio::sync::mpsc;
use tracing::info;

/// Terminal state of a task, without error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
  Succeeded,
  Skipped,
  Failed,
  Cancelled,
  NotRun,
}

impl OutcomeKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      OutcomeKind::Succeeded => "succeeded",
      OutcomeKind::Skipped => "skipped",
      OutcomeKind::Failed => "failed",
      OutcomeKind::Cancelled => "cancelled",
      OutcomeKind::NotRun => "not_run",
    }
  }
}

/// Progress after a task reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
  pub graph: String,
  pub task: String,
  pub outcome: OutcomeKind,
  /// Number of tasks in a terminal state, including this one.
  pub completed: usize,
  pub total: usize,
}

impl ProgressEvent {
  /// Completion ratio in `[0, 1]`.
  pub fn ratio(&self) -> f64 {
    if self.total == 0 {
      1.0
    } else {
      self.completed as f64 / self.total as f64
    }
  }
}

/// Sink for progress events.
pub trait ProgressReporter: Send + Sync {
  fn report(&self, event: ProgressEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopProgressReporter;

impl ProgressReporter for NoopProgressReporter {
  fn report(&self, _event: ProgressEvent) {}
}

/// Emits each event through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
  fn report(&self, event: ProgressEvent) {
    info!(
      graph = %event.graph,
      task = %event.task,
      outcome = event.outcome.as_str(),
      completed = event.completed,
      total = event.total,
      "progress {}/{}",
      event.completed,
      event.total
    );
  }
}

/// Forwards events to an unbounded channel.
///
/// Progress volume is one event per task, so the channel stays small.
#[derive(Debug, Clone)]
pub struct ChannelProgressReporter {
  sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressReporter {
  pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
    Self { sender }
  }
}

impl ProgressReporter for ChannelProgressReporter {
  fn report(&self, event: ProgressEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
