//! Main and events etcd: statefulsets, client services and their volumes.

use garden_flow::{TaskContext, TaskError};
use garden_reconcile::{delete_all, reconcile};
use garden_store::{ResourceIdentity, ResourceKind};
use serde_json::{Value, json};
use tracing::info;

use crate::names::{
  ETCD_ROLE_EVENTS, ETCD_ROLE_MAIN, LABEL_KEY_APP, LABEL_KEY_COMPONENT, PREFIX,
  SECRET_NAME_ETCD_BACKUP, STORAGE_CLASS_NAME_ETCD, etcd_client_service, etcd_name,
};
use crate::operation::{RunContext, labels};

const ROLES: [&str; 2] = [ETCD_ROLE_MAIN, ETCD_ROLE_EVENTS];
const CLIENT_PORT: u16 = 2379;

fn component(role: &str) -> String {
  format!("etcd-{role}")
}

fn statefulset_spec(op: &RunContext, role: &str) -> Value {
  let labels = labels(&component(role));
  let storage_class = op
    .imports
    .virtual_garden
    .etcd
    .as_ref()
    .and_then(|e| e.storage_class_name.clone())
    .unwrap_or_else(|| STORAGE_CLASS_NAME_ETCD.to_string());

  let mut spec = json!({
    "replicas": 1,
    "serviceName": etcd_client_service(role),
    "selector": { "matchLabels": labels },
    "template": {
      "metadata": { "labels": labels },
      "spec": {
        "priorityClassName": op.imports.virtual_garden.priority_class_name,
        "containers": [{
          "name": "etcd",
          "command": [
            "etcd",
            format!("--name={}", etcd_name(role)),
            "--data-dir=/var/etcd/data",
            format!("--listen-client-urls=https://0.0.0.0:{CLIENT_PORT}"),
          ],
          "ports": [{ "name": "client", "containerPort": CLIENT_PORT }],
        }],
      },
    },
    "volumeClaimTemplates": [{
      "metadata": { "name": format!("{role}-etcd"), "labels": labels },
      "spec": {
        "storageClassName": storage_class,
        "accessModes": ["ReadWriteOnce"],
        "resources": { "requests": { "storage": "10Gi" } },
      },
    }],
  });

  // Only the main etcd is backed up.
  if let Some(backup) = op.imports.etcd_backup().filter(|_| role == ETCD_ROLE_MAIN) {
    spec["backup"] = json!({
      "provider": backup.infrastructure_provider,
      "region": backup.region,
      "bucketName": backup.bucket_name,
      "secretRef": { "name": SECRET_NAME_ETCD_BACKUP },
    });
  }
  spec
}

pub(crate) async fn deploy(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  let op = &ctx.state;

  for role in ROLES {
    ctx.check_cancelled()?;
    let service_id = op.identity(ResourceKind::Service, etcd_client_service(role));
    reconcile(op.store.as_ref(), &service_id, |service| {
      service.labels.extend(labels(&component(role)));
      service.spec = json!({
        "type": "ClusterIP",
        "selector": labels(&component(role)),
        "ports": [{ "name": "client", "port": CLIENT_PORT, "targetPort": CLIENT_PORT }],
      });
      Ok(())
    })
    .await
    .map_err(TaskError::failed)?;

    let spec = statefulset_spec(op, role);
    let statefulset_id = op.identity(ResourceKind::StatefulSet, etcd_name(role));
    reconcile(op.store.as_ref(), &statefulset_id, |statefulset| {
      statefulset.labels.extend(labels(&component(role)));
      statefulset.spec = spec;
      Ok(())
    })
    .await
    .map_err(TaskError::failed)?;
  }
  Ok(())
}

/// Delete both etcds. Their persistent volume claims are removed only when
/// the imports hand volume lifecycle to this operation.
pub(crate) async fn delete(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  let op = &ctx.state;

  for role in ROLES {
    ctx.check_cancelled()?;
    delete_all(
      op.store.as_ref(),
      &[
        op.identity(ResourceKind::StatefulSet, etcd_name(role)),
        op.identity(ResourceKind::Service, etcd_client_service(role)),
      ],
    )
    .await
    .map_err(TaskError::failed)?;
  }

  let handle_volumes = op
    .imports
    .virtual_garden
    .etcd
    .as_ref()
    .is_some_and(|e| e.handle_etcd_persistent_volumes);
  if !handle_volumes {
    return Ok(());
  }

  ctx.check_cancelled()?;
  let claims: Vec<ResourceIdentity> = op
    .store
    .list(ResourceKind::PersistentVolumeClaim, &op.namespace)
    .await
    .map_err(TaskError::failed)?
    .into_iter()
    .filter(|claim| {
      claim.labels.get(LABEL_KEY_APP).map(String::as_str) == Some(PREFIX)
        && claim
          .labels
          .get(LABEL_KEY_COMPONENT)
          .is_some_and(|c| c.starts_with("etcd-"))
    })
    .map(|claim| claim.identity)
    .collect();

  info!(count = claims.len(), "etcd_volume_claims_deleting");
  delete_all(op.store.as_ref(), &claims)
    .await
    .map_err(TaskError::failed)
}
