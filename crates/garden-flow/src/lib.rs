//! Garden Flow
//!
//! This crate provides the task orchestration engine used by the virtual
//! garden operations. A [`Graph`] of named [`Task`]s with declared
//! dependencies is compiled into an [`ExecutionPlan`] of topological levels
//! and run by the [`Executor`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Graph<C>                           │
//! │  - add(task) registers a named task                         │
//! │  - compile() validates dependencies and detects cycles      │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ExecutionPlan<C>                       │
//! │  - levels of mutually independent tasks                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Executor                           │
//! │  - run(plan, state) → RunResult                             │
//! │  - skip predicates, fail-fast admission, cancellation       │
//! │  - serialized progress reporting                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut graph = Graph::new("Example");
//! let a = graph.add(Task::from_fn("a", |_ctx| async { Ok(()) }))?;
//! graph.add(Task::from_fn("b", |_ctx| async { Ok(()) }).depends_on(&a))?;
//!
//! let plan = graph.compile()?;
//! let result = Executor::new(ExecutorOptions::default())
//!   .run(&plan, Arc::new(()))
//!   .await;
//! result.into_result()?;
//! ```

mod error;
mod executor;
mod graph;
mod progress;
mod result;
mod task;

pub use error::{BoxError, CompileError, RunError, TaskError};
pub use executor::{Executor, ExecutorOptions};
pub use graph::{ExecutionPlan, Graph};
pub use progress::{
  ChannelProgressReporter, LogProgressReporter, NoopProgressReporter, OutcomeKind, ProgressEvent,
  ProgressReporter,
};
pub use result::{RunResult, TaskOutcome};
pub use task::{Task, TaskContext, TaskFn, TaskId};
