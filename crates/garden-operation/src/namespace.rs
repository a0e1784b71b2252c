use garden_flow::{TaskContext, TaskError};
use garden_reconcile::{delete_all, reconcile};
use garden_store::{ResourceIdentity, ResourceKind};

use crate::names::{LABEL_KEY_APP, PREFIX};
use crate::operation::RunContext;

fn identity(op: &RunContext) -> ResourceIdentity {
  ResourceIdentity::cluster(ResourceKind::Namespace, op.namespace.clone())
}

/// Ensure the hosting namespace exists. The namespace may be shared, so only
/// the app label is added and everything else is left as found.
pub(crate) async fn deploy(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;

  reconcile(op.store.as_ref(), &identity(op), |namespace| {
    namespace
      .labels
      .insert(LABEL_KEY_APP.to_string(), PREFIX.to_string());
    Ok(())
  })
  .await
  .map_err(TaskError::failed)?;
  Ok(())
}

pub(crate) async fn delete(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;
  delete_all(op.store.as_ref(), &[identity(op)])
    .await
    .map_err(TaskError::failed)
}
