//! Plan executor.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::TaskError;
use crate::graph::ExecutionPlan;
use crate::progress::{NoopProgressReporter, ProgressEvent, ProgressReporter};
use crate::result::{RunResult, TaskOutcome};
use crate::task::TaskContext;

/// Options for a run.
#[derive(Clone)]
pub struct ExecutorOptions {
  /// Run-scoped cancellation. Task bodies receive a child token.
  pub cancel: CancellationToken,
  pub reporter: Arc<dyn ProgressReporter>,
}

impl Default for ExecutorOptions {
  fn default() -> Self {
    Self {
      cancel: CancellationToken::new(),
      reporter: Arc::new(NoopProgressReporter),
    }
  }
}

/// Runs compiled plans level by level.
///
/// Tasks of one level are spawned concurrently; the next level is admitted
/// only once every task of the current level is terminal. The first failure
/// stops admission of further levels, lets already started siblings finish,
/// and marks everything that never started as not-run.
pub struct Executor {
  options: ExecutorOptions,
}

/// Bookkeeping for one run, owned by the scheduling loop.
struct RunState<'a> {
  graph: &'a str,
  reporter: &'a dyn ProgressReporter,
  outcomes: Vec<Option<TaskOutcome>>,
  completed: usize,
  first_failure: Option<(String, Arc<TaskError>)>,
  cancelled: bool,
}

impl RunState<'_> {
  fn record(&mut self, index: usize, name: &str, outcome: TaskOutcome) {
    if let TaskOutcome::Failed(err) = &outcome {
      if self.first_failure.is_none() {
        self.first_failure = Some((name.to_string(), err.clone()));
      }
    }
    if matches!(outcome, TaskOutcome::Cancelled) {
      self.cancelled = true;
    }

    let kind = outcome.kind();
    self.outcomes[index] = Some(outcome);
    self.completed += 1;
    self.reporter.report(ProgressEvent {
      graph: self.graph.to_string(),
      task: name.to_string(),
      outcome: kind,
      completed: self.completed,
      total: self.outcomes.len(),
    });
  }

  fn is_satisfied(&self, index: usize) -> bool {
    self.outcomes[index]
      .as_ref()
      .is_some_and(TaskOutcome::is_satisfied)
  }
}

impl Executor {
  pub fn new(options: ExecutorOptions) -> Self {
    Self { options }
  }

  /// Run `plan` to completion or first failure.
  ///
  /// Task failures are aggregated into the returned [`RunResult`]; this
  /// function itself does not fail.
  #[instrument(name = "flow_run", skip_all, fields(graph = %plan.name()))]
  pub async fn run<C>(&self, plan: &ExecutionPlan<C>, state: Arc<C>) -> RunResult
  where
    C: Send + Sync + 'static,
  {
    let run_id = uuid::Uuid::new_v4().to_string();
    let cancel = self.options.cancel.child_token();

    info!(
      run_id = %run_id,
      tasks = plan.len(),
      levels = plan.levels.len(),
      "run_started"
    );

    let mut run = RunState {
      graph: plan.name(),
      reporter: self.options.reporter.as_ref(),
      outcomes: vec![None; plan.len()],
      completed: 0,
      first_failure: None,
      cancelled: false,
    };

    for (depth, level) in plan.levels.iter().enumerate() {
      if run.first_failure.is_some() {
        break;
      }
      if run.cancelled || cancel.is_cancelled() {
        run.cancelled = true;
        break;
      }

      let mut in_flight = JoinSet::new();
      let mut spawned = Vec::with_capacity(level.len());

      for &index in level {
        let task = &plan.tasks[index];

        if !plan
          .dependencies_of(index)
          .iter()
          .all(|&d| run.is_satisfied(d))
        {
          continue;
        }

        match std::panic::catch_unwind(AssertUnwindSafe(|| task.should_skip())) {
          Ok(true) => {
            info!(run_id = %run_id, task = %task.name, "task_skipped");
            run.record(index, &task.name, TaskOutcome::Skipped);
            continue;
          }
          Ok(false) => {}
          Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(run_id = %run_id, task = %task.name, panic = %message, "task_failed");
            let err = TaskError::Panicked { message };
            run.record(index, &task.name, TaskOutcome::Failed(Arc::new(err)));
            continue;
          }
        }

        info!(run_id = %run_id, task = %task.name, level = depth, "task_started");

        let ctx = TaskContext {
          name: task.name.clone(),
          cancel: cancel.clone(),
          state: state.clone(),
        };
        let body = (task.body)(ctx);
        spawned.push(index);
        in_flight.spawn(async move { (index, AssertUnwindSafe(body).catch_unwind().await) });
      }

      while let Some(joined) = in_flight.join_next().await {
        let (index, result) = match joined {
          Ok(done) => done,
          Err(e) => {
            error!(run_id = %run_id, error = %e, "task_join_failed");
            continue;
          }
        };
        let name = plan.tasks[index].name.as_str();

        let outcome = match result {
          Ok(Ok(())) => {
            info!(run_id = %run_id, task = %name, "task_succeeded");
            TaskOutcome::Succeeded
          }
          Ok(Err(TaskError::Cancelled)) => {
            warn!(run_id = %run_id, task = %name, "task_cancelled");
            TaskOutcome::Cancelled
          }
          Ok(Err(e)) => {
            error!(run_id = %run_id, task = %name, error = %e, "task_failed");
            TaskOutcome::Failed(Arc::new(e))
          }
          Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(run_id = %run_id, task = %name, panic = %message, "task_failed");
            TaskOutcome::Failed(Arc::new(TaskError::Panicked { message }))
          }
        };
        run.record(index, name, outcome);
      }

      // A join error leaves a spawned task without an outcome.
      for index in spawned {
        if run.outcomes[index].is_none() {
          let message = "task aborted before completion".to_string();
          run.record(
            index,
            &plan.tasks[index].name,
            TaskOutcome::Failed(Arc::new(TaskError::Panicked { message })),
          );
        }
      }
    }

    if cancel.is_cancelled() {
      run.cancelled = true;
    }

    for index in plan.levels.iter().flatten().copied() {
      if run.outcomes[index].is_none() {
        run.record(index, &plan.tasks[index].name, TaskOutcome::NotRun);
      }
    }

    let RunState {
      outcomes,
      first_failure,
      cancelled,
      ..
    } = run;

    let outcomes: Vec<(String, TaskOutcome)> = plan
      .levels
      .iter()
      .flatten()
      .map(|&i| {
        let outcome = outcomes[i].clone().unwrap_or(TaskOutcome::NotRun);
        (plan.tasks[i].name.clone(), outcome)
      })
      .collect();

    match (&first_failure, cancelled) {
      (Some((task, err)), _) => {
        error!(run_id = %run_id, task = %task, error = %err, "run_failed");
      }
      (None, true) => warn!(run_id = %run_id, "run_cancelled"),
      (None, false) => info!(run_id = %run_id, "run_completed"),
    }

    RunResult {
      run_id,
      graph: plan.name().to_string(),
      outcomes,
      first_failure,
      cancelled,
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic payload".to_string()
  }
}
