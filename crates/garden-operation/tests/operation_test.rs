//! End-to-end deploy and delete runs against the in-memory store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use garden_config::{
  AuditWebhookConfig, ConfigError, Credentials, Etcd, EtcdBackup, HostingCluster, Imports,
  KubeApiServer, VirtualGarden,
};
use garden_flow::{ExecutorOptions, OutcomeKind, TaskOutcome};
use garden_operation::names::{self, delete, deploy};
use garden_operation::{Operation, OperationError};
use garden_reconcile::{SecretSource, SeededSecretSource};
use garden_store::{InMemoryStore, Object, ResourceIdentity, ResourceKind, Store, StoreError};

const NAMESPACE: &str = "garden";

fn imports() -> Imports {
  Imports {
    hosting_cluster: HostingCluster {
      kubeconfig: "apiVersion: v1".into(),
      namespace: NAMESPACE.into(),
      infrastructure_provider: "gcp".into(),
    },
    ..Default::default()
  }
}

fn with_audit_config(mut imports: Imports, config: &str) -> Imports {
  imports.virtual_garden.kube_api_server = Some(KubeApiServer {
    audit_webhook_config: AuditWebhookConfig {
      config: config.into(),
    },
    ..Default::default()
  });
  imports
}

fn with_backup(mut imports: Imports) -> Imports {
  imports.virtual_garden.etcd = Some(Etcd {
    handle_etcd_persistent_volumes: true,
    backup: Some(EtcdBackup {
      infrastructure_provider: "gcp".into(),
      region: "europe-west1".into(),
      bucket_name: "garden-etcd-backup".into(),
      credentials_ref: "backup".into(),
    }),
    ..Default::default()
  });
  imports.credentials.insert(
    "backup".into(),
    Credentials {
      kind: "gcp".into(),
      data: BTreeMap::from([("serviceaccount.json".to_string(), "{}".to_string())]),
    },
  );
  imports
}

fn operation(store: &Arc<InMemoryStore>, imports: Imports) -> Operation {
  let source: Arc<dyn SecretSource> = Arc::new(SeededSecretSource::new(11));
  Operation::new(store.clone(), imports, source).unwrap()
}

fn secret(name: &str) -> ResourceIdentity {
  ResourceIdentity::namespaced(ResourceKind::Secret, NAMESPACE, name)
}

fn apiserver_deployment() -> ResourceIdentity {
  ResourceIdentity::namespaced(
    ResourceKind::Deployment,
    NAMESPACE,
    names::DEPLOYMENT_NAME_KUBE_APISERVER,
  )
}

async fn pod_annotations(store: &InMemoryStore) -> serde_json::Value {
  let deployment = store.get(&apiserver_deployment()).await.unwrap().unwrap();
  deployment.spec["template"]["metadata"]["annotations"].clone()
}

#[tokio::test]
async fn test_deploy_creates_control_plane() {
  let store = Arc::new(InMemoryStore::new());
  let result = operation(&store, imports())
    .deploy(ExecutorOptions::default())
    .await
    .unwrap();

  assert!(result.is_success(), "{result:?}");
  assert_eq!(result.outcomes.len(), 7);
  assert_eq!(result.tasks_with(OutcomeKind::Skipped), vec![deploy::BACKUP_BUCKET]);

  let namespace = ResourceIdentity::cluster(ResourceKind::Namespace, NAMESPACE);
  assert!(store.get(&namespace).await.unwrap().is_some());

  let class = ResourceIdentity::cluster(ResourceKind::StorageClass, names::STORAGE_CLASS_NAME_ETCD);
  let class = store.get(&class).await.unwrap().unwrap();
  assert_eq!(class.spec["provisioner"], "kubernetes.io/gce-pd");
  assert_eq!(class.spec["parameters"]["type"], "pd-ssd");

  for role in [names::ETCD_ROLE_MAIN, names::ETCD_ROLE_EVENTS] {
    let id =
      ResourceIdentity::namespaced(ResourceKind::StatefulSet, NAMESPACE, names::etcd_name(role));
    let etcd = store.get(&id).await.unwrap().unwrap();
    assert!(etcd.spec.get("backup").is_none());
  }

  let basic_auth = store.get(&secret(names::SECRET_NAME_BASIC_AUTH)).await.unwrap().unwrap();
  let csv = String::from_utf8(
    basic_auth
      .data_value(names::DATA_KEY_BASIC_AUTH)
      .unwrap()
      .to_vec(),
  )
  .unwrap();
  let (password, rest) = csv.split_once(',').unwrap();
  assert_eq!(password.len(), 32);
  assert_eq!(rest, "admin,admin,system:masters");

  assert!(store.get(&secret(names::SECRET_NAME_ENCRYPTION_CONFIG)).await.unwrap().is_some());
  // Disabled by the imports.
  assert!(store.get(&secret(names::SECRET_NAME_AUDIT_WEBHOOK_CONFIG)).await.unwrap().is_none());
  assert!(store.get(&secret(names::SECRET_NAME_ADMISSION_KUBECONFIG)).await.unwrap().is_none());

  let annotations = pod_annotations(&store).await;
  let annotations = annotations.as_object().unwrap();
  assert_eq!(annotations.len(), 2);
  assert!(annotations.contains_key(names::CHECKSUM_KEY_BASIC_AUTH));
  assert!(annotations.contains_key(names::CHECKSUM_KEY_ENCRYPTION_CONFIG));

  let controller_manager = ResourceIdentity::namespaced(
    ResourceKind::Deployment,
    NAMESPACE,
    names::DEPLOYMENT_NAME_KUBE_CONTROLLER_MANAGER,
  );
  assert!(store.get(&controller_manager).await.unwrap().is_some());
}

#[tokio::test]
async fn test_redeploy_keeps_generated_secrets() {
  let store = Arc::new(InMemoryStore::new());
  let op = operation(&store, imports());

  op.deploy(ExecutorOptions::default()).await.unwrap();
  let basic_auth = store.get(&secret(names::SECRET_NAME_BASIC_AUTH)).await.unwrap().unwrap();
  let encryption = store.get(&secret(names::SECRET_NAME_ENCRYPTION_CONFIG)).await.unwrap().unwrap();
  let annotations = pod_annotations(&store).await;
  let objects = store.len().await;

  // A fresh operation with a different seed must still reuse the stored material.
  let source: Arc<dyn SecretSource> = Arc::new(SeededSecretSource::new(99));
  let again = Operation::new(store.clone(), imports(), source).unwrap();
  let result = again.deploy(ExecutorOptions::default()).await.unwrap();
  assert!(result.is_success());

  assert_eq!(
    store.get(&secret(names::SECRET_NAME_BASIC_AUTH)).await.unwrap().unwrap(),
    basic_auth
  );
  assert_eq!(
    store.get(&secret(names::SECRET_NAME_ENCRYPTION_CONFIG)).await.unwrap().unwrap(),
    encryption
  );
  assert_eq!(basic_auth.generation, 1);
  assert_eq!(pod_annotations(&store).await, annotations);
  assert_eq!(store.get(&apiserver_deployment()).await.unwrap().unwrap().generation, 1);
  assert_eq!(store.len().await, objects);
}

#[tokio::test]
async fn test_one_operation_runs_repeatedly() {
  let store = Arc::new(InMemoryStore::new());
  let op = operation(&store, with_audit_config(imports(), "kind: Config"));

  assert!(op.deploy(ExecutorOptions::default()).await.unwrap().is_success());
  let annotations = pod_annotations(&store).await;

  assert!(op.delete(ExecutorOptions::default()).await.unwrap().is_success());
  assert!(store.get(&apiserver_deployment()).await.unwrap().is_none());

  // Generated secrets are new after the delete, the audit config is not.
  assert!(op.deploy(ExecutorOptions::default()).await.unwrap().is_success());
  let redeployed = pod_annotations(&store).await;
  let audit = names::CHECKSUM_KEY_AUDIT_WEBHOOK_CONFIG;
  assert_eq!(redeployed[audit], annotations[audit]);
  assert_ne!(
    redeployed[names::CHECKSUM_KEY_BASIC_AUTH],
    annotations[names::CHECKSUM_KEY_BASIC_AUTH]
  );
  assert_eq!(store.get(&apiserver_deployment()).await.unwrap().unwrap().generation, 1);
}

#[tokio::test]
async fn test_audit_config_change_rolls_deployment() {
  let store = Arc::new(InMemoryStore::new());

  operation(&store, with_audit_config(imports(), "kind: Config # v1"))
    .deploy(ExecutorOptions::default())
    .await
    .unwrap();
  let before = pod_annotations(&store).await;

  operation(&store, with_audit_config(imports(), "kind: Config # v2"))
    .deploy(ExecutorOptions::default())
    .await
    .unwrap();
  let after = pod_annotations(&store).await;

  let audit = names::CHECKSUM_KEY_AUDIT_WEBHOOK_CONFIG;
  assert!(before.get(audit).is_some());
  assert_ne!(before[audit], after[audit]);
  assert_eq!(
    before[names::CHECKSUM_KEY_BASIC_AUTH],
    after[names::CHECKSUM_KEY_BASIC_AUTH]
  );
  assert_eq!(store.get(&apiserver_deployment()).await.unwrap().unwrap().generation, 2);

  let audit_secret = store
    .get(&secret(names::SECRET_NAME_AUDIT_WEBHOOK_CONFIG))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(
    audit_secret.data_value(names::DATA_KEY_AUDIT_WEBHOOK_CONFIG),
    Some(&b"kind: Config # v2"[..])
  );
}

#[tokio::test]
async fn test_deploy_with_backup() {
  let store = Arc::new(InMemoryStore::new());
  let result = operation(&store, with_backup(imports()))
    .deploy(ExecutorOptions::default())
    .await
    .unwrap();
  assert!(result.is_success());
  assert!(matches!(result.outcome(deploy::BACKUP_BUCKET), Some(TaskOutcome::Succeeded)));

  let bucket = ResourceIdentity::cluster(ResourceKind::BackupBucket, "garden-etcd-backup");
  let bucket = store.get(&bucket).await.unwrap().unwrap();
  assert_eq!(bucket.spec["region"], "europe-west1");

  let credentials = store.get(&secret(names::SECRET_NAME_ETCD_BACKUP)).await.unwrap().unwrap();
  assert_eq!(credentials.data_value("serviceaccount.json"), Some(&b"{}"[..]));

  let main = ResourceIdentity::namespaced(
    ResourceKind::StatefulSet,
    NAMESPACE,
    names::etcd_name(names::ETCD_ROLE_MAIN),
  );
  let main = store.get(&main).await.unwrap().unwrap();
  assert_eq!(main.spec["backup"]["bucketName"], "garden-etcd-backup");
}

#[tokio::test]
async fn test_storage_class_skipped_when_named() {
  let store = Arc::new(InMemoryStore::new());
  let mut imports = imports();
  imports.virtual_garden.etcd = Some(Etcd {
    storage_class_name: Some("fast".into()),
    ..Default::default()
  });

  let result = operation(&store, imports)
    .deploy(ExecutorOptions::default())
    .await
    .unwrap();
  assert!(matches!(result.outcome(deploy::STORAGE_CLASS), Some(TaskOutcome::Skipped)));

  let main = ResourceIdentity::namespaced(
    ResourceKind::StatefulSet,
    NAMESPACE,
    names::etcd_name(names::ETCD_ROLE_MAIN),
  );
  let main = store.get(&main).await.unwrap().unwrap();
  assert_eq!(
    main.spec["volumeClaimTemplates"][0]["spec"]["storageClassName"],
    "fast"
  );
}

#[tokio::test]
async fn test_delete_on_empty_store_succeeds() {
  let store = Arc::new(InMemoryStore::new());
  let result = operation(&store, imports())
    .delete(ExecutorOptions::default())
    .await
    .unwrap();

  assert!(result.is_success());
  assert_eq!(result.outcomes.len(), 6);
  assert_eq!(result.tasks_with(OutcomeKind::Skipped), vec![delete::NAMESPACE]);
}

#[tokio::test]
async fn test_deploy_then_delete_removes_everything_owned() {
  let store = Arc::new(InMemoryStore::new());
  let mut imports = with_backup(imports());
  imports.virtual_garden.delete_namespace = true;
  let op = operation(&store, imports);

  op.deploy(ExecutorOptions::default()).await.unwrap();

  // Claims created by the statefulset controller, plus one that is not ours.
  let mut claim = Object::empty(ResourceIdentity::namespaced(
    ResourceKind::PersistentVolumeClaim,
    NAMESPACE,
    "main-etcd-virtual-garden-etcd-main-0",
  ));
  claim.labels.insert(names::LABEL_KEY_APP.into(), names::PREFIX.into());
  claim.labels.insert(names::LABEL_KEY_COMPONENT.into(), "etcd-main".into());
  store.create(claim).await.unwrap();
  let foreign = Object::empty(ResourceIdentity::namespaced(
    ResourceKind::PersistentVolumeClaim,
    NAMESPACE,
    "unrelated",
  ));
  store.create(foreign).await.unwrap();

  let result = op.delete(ExecutorOptions::default()).await.unwrap();
  assert!(result.is_success(), "{result:?}");
  assert!(result.tasks_with(OutcomeKind::Skipped).is_empty());

  for kind in [
    ResourceKind::Secret,
    ResourceKind::Service,
    ResourceKind::Deployment,
    ResourceKind::StatefulSet,
  ] {
    assert!(store.list(kind, NAMESPACE).await.unwrap().is_empty(), "{kind}");
  }
  let claims = store
    .list(ResourceKind::PersistentVolumeClaim, NAMESPACE)
    .await
    .unwrap();
  assert_eq!(claims.len(), 1);
  assert_eq!(claims[0].identity.name, "unrelated");

  let namespace = ResourceIdentity::cluster(ResourceKind::Namespace, NAMESPACE);
  assert!(store.get(&namespace).await.unwrap().is_none());
  let bucket = ResourceIdentity::cluster(ResourceKind::BackupBucket, "garden-etcd-backup");
  assert!(store.get(&bucket).await.unwrap().is_none());

  // Deleting again is a no-op.
  assert!(op.delete(ExecutorOptions::default()).await.unwrap().is_success());
}

/// Store that rejects writes of one kind and delegates everything else.
struct RejectingStore {
  inner: InMemoryStore,
  kind: ResourceKind,
}

#[async_trait]
impl Store for RejectingStore {
  async fn get(&self, identity: &ResourceIdentity) -> Result<Option<Object>, StoreError> {
    self.inner.get(identity).await
  }

  async fn create(&self, object: Object) -> Result<Object, StoreError> {
    if object.identity.kind == self.kind {
      return Err(StoreError::Permanent {
        message: "admission denied".into(),
      });
    }
    self.inner.create(object).await
  }

  async fn update(&self, object: Object) -> Result<Object, StoreError> {
    self.inner.update(object).await
  }

  async fn delete(&self, identity: &ResourceIdentity) -> Result<(), StoreError> {
    self.inner.delete(identity).await
  }

  async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Object>, StoreError> {
    self.inner.list(kind, namespace).await
  }
}

#[tokio::test]
async fn test_store_failure_stops_dependents() {
  let store = Arc::new(RejectingStore {
    inner: InMemoryStore::new(),
    kind: ResourceKind::Service,
  });
  let source: Arc<dyn SecretSource> = Arc::new(SeededSecretSource::new(1));
  let op = Operation::new(store.clone(), imports(), source).unwrap();

  let result = op.deploy(ExecutorOptions::default()).await.unwrap();

  assert!(!result.is_success());
  let (task, error) = result.first_failure.clone().unwrap();
  assert_eq!(task, deploy::KUBE_APISERVER_SERVICE);
  assert!(error.to_string().contains("admission denied"));

  // Siblings on the failing level finish; later levels never start.
  assert!(matches!(result.outcome(deploy::KUBE_APISERVER_SECRETS), Some(TaskOutcome::Succeeded)));
  assert!(matches!(result.outcome(deploy::ETCD), Some(TaskOutcome::NotRun)));
  assert!(matches!(
    result.outcome(deploy::KUBE_APISERVER_DEPLOYMENT),
    Some(TaskOutcome::NotRun)
  ));
  assert!(store.inner.get(&apiserver_deployment()).await.unwrap().is_none());

  let err = result.into_result().unwrap_err();
  assert!(err.to_string().contains(&task));
}

#[tokio::test]
async fn test_cancelled_before_start() {
  let store = Arc::new(InMemoryStore::new());
  let options = ExecutorOptions::default();
  options.cancel.cancel();

  let result = operation(&store, imports()).deploy(options).await.unwrap();

  assert!(result.cancelled);
  assert!(!result.is_success());
  assert!(store.is_empty().await);
}

#[test]
fn test_invalid_imports_rejected() {
  let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
  let source: Arc<dyn SecretSource> = Arc::new(SeededSecretSource::new(1));
  let mut imports = imports();
  imports.hosting_cluster.namespace.clear();

  let errors = match Operation::new(store, imports, source) {
    Err(OperationError::Config(ConfigError::Invalid { errors })) => errors,
    Err(err) => panic!("expected validation errors, got {err}"),
    Ok(_) => panic!("expected validation errors"),
  };
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].field, "hostingCluster.namespace");
}
