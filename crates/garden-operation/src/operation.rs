//! The virtual garden operation: shared state and graph construction.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use garden_config::{ConfigError, Imports, InfrastructureProvider, validate_imports};
use garden_flow::{Executor, ExecutorOptions, Graph, RunResult, Task};
use garden_reconcile::{Checksums, SecretSource};
use garden_store::{Object, ResourceIdentity, ResourceKind, Store};
use tracing::{info, instrument};

use crate::error::OperationError;
use crate::names::{self, delete, deploy};
use crate::{deployment, etcd, namespace, secrets, service, storage};

/// Deploys or deletes one virtual garden in a hosting namespace.
pub struct Operation {
  store: Arc<dyn Store>,
  imports: Arc<Imports>,
  namespace: String,
  provider: InfrastructureProvider,
  secrets: Arc<dyn SecretSource>,
}

/// State shared by the task bodies of a single run.
///
/// Secret tasks record fingerprints of what they wrote into `checksums` and
/// the deployment task stamps them onto the pod template.
pub(crate) struct RunContext {
  pub(crate) store: Arc<dyn Store>,
  pub(crate) imports: Arc<Imports>,
  pub(crate) namespace: String,
  pub(crate) provider: InfrastructureProvider,
  pub(crate) secrets: Arc<dyn SecretSource>,
  checksums: Mutex<Checksums>,
}

impl Operation {
  /// Create an operation from validated imports.
  pub fn new(
    store: Arc<dyn Store>,
    imports: Imports,
    secrets: Arc<dyn SecretSource>,
  ) -> Result<Self, OperationError> {
    let errors = validate_imports(&imports);
    if !errors.is_empty() {
      return Err(ConfigError::Invalid { errors }.into());
    }
    let provider = imports
      .hosting_cluster
      .infrastructure_provider
      .parse::<InfrastructureProvider>()?;

    Ok(Self {
      store,
      namespace: imports.hosting_cluster.namespace.clone(),
      imports: Arc::new(imports),
      provider,
      secrets,
    })
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  pub fn imports(&self) -> &Imports {
    &self.imports
  }

  /// Run the deploy graph.
  #[instrument(name = "deploy", skip_all, fields(namespace = %self.namespace))]
  pub async fn deploy(&self, options: ExecutorOptions) -> Result<RunResult, OperationError> {
    let graph = self.deploy_graph()?;
    self.run(graph, options).await
  }

  /// Run the delete graph.
  #[instrument(name = "delete", skip_all, fields(namespace = %self.namespace))]
  pub async fn delete(&self, options: ExecutorOptions) -> Result<RunResult, OperationError> {
    let graph = self.delete_graph()?;
    self.run(graph, options).await
  }

  async fn run(
    &self,
    graph: Graph<RunContext>,
    options: ExecutorOptions,
  ) -> Result<RunResult, OperationError> {
    let plan = graph.compile()?;
    info!(graph = plan.name(), tasks = plan.len(), "operation_started");

    let result = Executor::new(options)
      .run(&plan, Arc::new(RunContext::new(self)))
      .await;

    info!(
      graph = plan.name(),
      success = result.is_success(),
      cancelled = result.cancelled,
      "operation_finished"
    );
    Ok(result)
  }

  fn deploy_graph(&self) -> Result<Graph<RunContext>, OperationError> {
    let etcd_settings = self.imports.virtual_garden.etcd.as_ref();
    let has_storage_class = etcd_settings.is_some_and(|e| e.storage_class_name.is_some());
    let has_backup = self.imports.etcd_backup().is_some();

    let mut graph = Graph::new("virtual-garden-deploy");

    let namespace = graph.add(Task::from_fn(deploy::NAMESPACE, namespace::deploy))?;
    let storage_class = graph.add(
      Task::from_fn(deploy::STORAGE_CLASS, storage::deploy_storage_class)
        .depends_on(&namespace)
        .skip_when(has_storage_class),
    )?;
    let backup_bucket = graph.add(
      Task::from_fn(deploy::BACKUP_BUCKET, storage::deploy_backup_bucket)
        .depends_on(&namespace)
        .skip_when(!has_backup),
    )?;
    let etcd = graph.add(
      Task::from_fn(deploy::ETCD, etcd::deploy).depends_on_all([&storage_class, &backup_bucket]),
    )?;
    let service = graph.add(
      Task::from_fn(deploy::KUBE_APISERVER_SERVICE, service::deploy).depends_on(&namespace),
    )?;
    let secrets = graph.add(
      Task::from_fn(deploy::KUBE_APISERVER_SECRETS, secrets::deploy).depends_on(&namespace),
    )?;
    graph.add(
      Task::from_fn(deploy::KUBE_APISERVER_DEPLOYMENT, deployment::deploy)
        .depends_on_all([&etcd, &service, &secrets]),
    )?;

    Ok(graph)
  }

  fn delete_graph(&self) -> Result<Graph<RunContext>, OperationError> {
    let mut graph = Graph::new("virtual-garden-delete");

    let deployments = graph.add(Task::from_fn(
      delete::KUBE_APISERVER_DEPLOYMENTS,
      deployment::delete,
    ))?;
    let secrets = graph.add(
      Task::from_fn(delete::KUBE_APISERVER_SECRETS, secrets::delete).depends_on(&deployments),
    )?;
    let service = graph.add(Task::from_fn(
      delete::KUBE_APISERVER_SERVICE,
      service::delete,
    ))?;
    let etcd = graph.add(Task::from_fn(delete::ETCD, etcd::delete).depends_on(&deployments))?;
    let backup_bucket = graph.add(
      Task::from_fn(delete::BACKUP_BUCKET, storage::delete_backup_bucket).depends_on(&etcd),
    )?;
    graph.add(
      Task::from_fn(delete::NAMESPACE, namespace::delete)
        .depends_on_all([&secrets, &service, &etcd, &backup_bucket])
        .skip_when(!self.imports.virtual_garden.delete_namespace),
    )?;

    Ok(graph)
  }

}

impl RunContext {
  fn new(operation: &Operation) -> Self {
    Self {
      store: operation.store.clone(),
      imports: operation.imports.clone(),
      namespace: operation.namespace.clone(),
      provider: operation.provider,
      secrets: operation.secrets.clone(),
      checksums: Mutex::new(Checksums::new()),
    }
  }

  pub(crate) fn identity(&self, kind: ResourceKind, name: impl Into<String>) -> ResourceIdentity {
    ResourceIdentity::namespaced(kind, self.namespace.clone(), name)
  }

  pub(crate) fn record_checksum(&self, key: &str, object: &Object) {
    let mut checksums = self.checksums.lock().unwrap_or_else(|e| e.into_inner());
    checksums.record_object(key, object);
  }

  pub(crate) fn stamp_checksums(&self, keys: &[&str]) -> BTreeMap<String, String> {
    let checksums = self.checksums.lock().unwrap_or_else(|e| e.into_inner());
    checksums.stamp_annotations(keys)
  }
}

/// Standard labels of objects owned by the virtual garden.
pub(crate) fn labels(component: &str) -> BTreeMap<String, String> {
  BTreeMap::from([
    (names::LABEL_KEY_APP.to_string(), names::PREFIX.to_string()),
    (names::LABEL_KEY_COMPONENT.to_string(), component.to_string()),
  ])
}
