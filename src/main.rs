use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use garden_config::{ConfigError, Imports};
use garden_flow::{ExecutorOptions, LogProgressReporter, RunError, RunResult};
use garden_operation::Operation;
use garden_reconcile::OsSecretSource;
use garden_store::FsStore;

/// Virtual Garden - deploys a virtual garden control plane into a hosting cluster
#[derive(Parser)]
#[command(name = "virtual-garden")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the state directory (default: ~/.virtual-garden)
  #[arg(long, global = true)]
  state_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Deploy or update the virtual garden
  Deploy {
    /// Path to the imports file (YAML or JSON)
    #[arg(long)]
    imports: PathBuf,
  },

  /// Delete the virtual garden
  Delete {
    /// Path to the imports file (YAML or JSON)
    #[arg(long)]
    imports: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let state_dir = match cli.state_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".virtual-garden"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Commands::Deploy { imports } => rt.block_on(run(Action::Deploy, imports, state_dir)),
    Commands::Delete { imports } => rt.block_on(run(Action::Delete, imports, state_dir)),
  }
}

#[derive(Clone, Copy)]
enum Action {
  Deploy,
  Delete,
}

async fn run(action: Action, imports_file: PathBuf, state_dir: PathBuf) -> Result<()> {
  let imports = match Imports::load(&imports_file) {
    Ok(imports) => imports,
    Err(ConfigError::Invalid { errors }) => {
      for error in &errors {
        eprintln!("  {error}");
      }
      bail!(
        "{} has {} invalid field(s)",
        imports_file.display(),
        errors.len()
      );
    }
    Err(e) => return Err(e).context("failed to load imports"),
  };

  eprintln!(
    "Loaded imports for namespace: {}",
    imports.hosting_cluster.namespace
  );

  let store = Arc::new(FsStore::new(&state_dir));
  let operation = Operation::new(store, imports, Arc::new(OsSecretSource))
    .context("failed to create operation")?;

  let cancel = CancellationToken::new();
  tokio::spawn({
    let cancel = cancel.clone();
    async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, cancelling");
        cancel.cancel();
      }
    }
  });

  let options = ExecutorOptions {
    cancel,
    reporter: Arc::new(LogProgressReporter),
  };
  let result = match action {
    Action::Deploy => operation.deploy(options).await,
    Action::Delete => operation.delete(options).await,
  }
  .context("failed to start operation")?;

  print_summary(&result);

  match result.into_result() {
    Ok(()) => Ok(()),
    Err(RunError::TaskFailed { task, source }) => bail!("task '{task}' failed: {source}"),
    Err(RunError::Cancelled) => bail!("operation cancelled"),
  }
}

fn print_summary(result: &RunResult) {
  eprintln!("Run {} ({}):", result.run_id, result.graph);
  for (task, outcome) in &result.outcomes {
    eprintln!("  {:<36} {}", task, outcome.kind().as_str());
  }
}
