use garden_config::ConfigError;
use garden_flow::CompileError;
use thiserror::Error;

/// Errors raised before an operation's graph starts running.
///
/// Failures of individual steps are reported through the
/// [`RunResult`](garden_flow::RunResult) instead.
#[derive(Debug, Error)]
pub enum OperationError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("failed to build task graph: {0}")]
  Compile(#[from] CompileError),
}
