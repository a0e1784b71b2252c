//! Task definitions.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Body of a task.
pub type TaskFn<C> =
  Arc<dyn Fn(TaskContext<C>) -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;

type SkipFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Handle to a task registered in a graph. Identity is the task name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(String);

impl TaskId {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for TaskId {
  fn from(name: &str) -> Self {
    Self::new(name)
  }
}

impl From<String> for TaskId {
  fn from(name: String) -> Self {
    Self(name)
  }
}

impl From<&TaskId> for TaskId {
  fn from(id: &TaskId) -> Self {
    id.clone()
  }
}

/// Per-run context handed to every task body.
///
/// `state` is shared by all tasks of one run. Bodies should check `cancel`
/// at their external-call boundaries and return [`TaskError::Cancelled`].
pub struct TaskContext<C> {
  pub name: String,
  pub cancel: CancellationToken,
  pub state: Arc<C>,
}

impl<C> TaskContext<C> {
  /// Fail with [`TaskError::Cancelled`] if the run was cancelled.
  pub fn check_cancelled(&self) -> Result<(), TaskError> {
    if self.cancel.is_cancelled() {
      Err(TaskError::Cancelled)
    } else {
      Ok(())
    }
  }
}

impl<C> Clone for TaskContext<C> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      cancel: self.cancel.clone(),
      state: self.state.clone(),
    }
  }
}

/// A named unit of work with declared dependencies and an optional skip predicate.
pub struct Task<C> {
  pub(crate) name: String,
  pub(crate) body: TaskFn<C>,
  pub(crate) dependencies: BTreeSet<String>,
  pub(crate) skip: Option<SkipFn>,
}

impl<C: Send + Sync + 'static> Task<C> {
  /// Create a task from a body returning a boxed future.
  pub fn new<F>(name: impl Into<String>, body: F) -> Self
  where
    F: Fn(TaskContext<C>) -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      body: Arc::new(body),
      dependencies: BTreeSet::new(),
      skip: None,
    }
  }

  /// Create a task from an async closure.
  pub fn from_fn<F, Fut>(name: impl Into<String>, body: F) -> Self
  where
    F: Fn(TaskContext<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
  {
    Self::new(name, move |ctx| body(ctx).boxed())
  }
}

impl<C> Task<C> {
  pub fn depends_on(mut self, dependency: impl Into<TaskId>) -> Self {
    self.dependencies.insert(dependency.into().0);
    self
  }

  pub fn depends_on_all<I, D>(mut self, dependencies: I) -> Self
  where
    I: IntoIterator<Item = D>,
    D: Into<TaskId>,
  {
    self
      .dependencies
      .extend(dependencies.into_iter().map(|d| d.into().0));
    self
  }

  /// Skip the task when `predicate` returns true at admission time.
  pub fn skip_if(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
    self.skip = Some(Arc::new(predicate));
    self
  }

  /// Skip the task when a condition known at build time holds.
  pub fn skip_when(self, condition: bool) -> Self {
    self.skip_if(move || condition)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn dependencies(&self) -> impl Iterator<Item = &str> {
    self.dependencies.iter().map(String::as_str)
  }

  pub(crate) fn should_skip(&self) -> bool {
    self.skip.as_ref().is_some_and(|skip| skip())
  }
}

impl<C> fmt::Debug for Task<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("name", &self.name)
      .field("dependencies", &self.dependencies)
      .field("skip", &self.skip.is_some())
      .finish()
  }
}
