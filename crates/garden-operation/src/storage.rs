//! Etcd storage class and backup bucket.

use garden_flow::{TaskContext, TaskError};
use garden_reconcile::{delete_all, reconcile};
use garden_store::{ResourceIdentity, ResourceKind};
use serde_json::json;
use tracing::debug;

use crate::names::{SECRET_NAME_ETCD_BACKUP, STORAGE_CLASS_NAME_ETCD};
use crate::operation::{RunContext, labels};

pub(crate) async fn deploy_storage_class(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;
  let config = op.provider.storage_class_configuration();
  let id = ResourceIdentity::cluster(ResourceKind::StorageClass, STORAGE_CLASS_NAME_ETCD);

  reconcile(op.store.as_ref(), &id, |class| {
    class.labels.extend(labels("etcd"));
    class.spec = json!({
      "provisioner": config.provisioner,
      "parameters": config.parameters,
      "allowVolumeExpansion": true,
      "volumeBindingMode": "WaitForFirstConsumer",
    });
    Ok(())
  })
  .await
  .map_err(TaskError::failed)?;
  Ok(())
}

/// Write the backup credentials secret, then the bucket referencing it.
pub(crate) async fn deploy_backup_bucket(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;
  let Some(backup) = op.imports.etcd_backup() else {
    debug!("backup_not_configured");
    return Ok(());
  };
  let credentials = op
    .imports
    .credentials
    .get(&backup.credentials_ref)
    .ok_or_else(|| {
      TaskError::failed(format!(
        "backup credentials {:?} not found",
        backup.credentials_ref
      ))
    })?;

  let secret_id = op.identity(ResourceKind::Secret, SECRET_NAME_ETCD_BACKUP);
  reconcile(op.store.as_ref(), &secret_id, |secret| {
    secret.labels.extend(labels("etcd"));
    secret.data = credentials
      .data
      .iter()
      .map(|(k, v)| (k.clone(), v.clone().into_bytes()))
      .collect();
    Ok(())
  })
  .await
  .map_err(TaskError::failed)?;

  ctx.check_cancelled()?;
  let bucket_id = ResourceIdentity::cluster(ResourceKind::BackupBucket, backup.bucket_name.clone());
  reconcile(op.store.as_ref(), &bucket_id, |bucket| {
    bucket.labels.extend(labels("etcd"));
    bucket.spec = json!({
      "provider": backup.infrastructure_provider,
      "region": backup.region,
      "secretRef": { "name": SECRET_NAME_ETCD_BACKUP, "namespace": op.namespace },
    });
    Ok(())
  })
  .await
  .map_err(TaskError::failed)?;
  Ok(())
}

pub(crate) async fn delete_backup_bucket(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;

  let mut identities = Vec::new();
  if let Some(backup) = op.imports.etcd_backup() {
    identities.push(ResourceIdentity::cluster(
      ResourceKind::BackupBucket,
      backup.bucket_name.clone(),
    ));
  }
  identities.push(op.identity(ResourceKind::Secret, SECRET_NAME_ETCD_BACKUP));

  delete_all(op.store.as_ref(), &identities)
    .await
    .map_err(TaskError::failed)
}
