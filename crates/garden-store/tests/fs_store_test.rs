//! Integration tests for FsStore.

use garden_store::{FsStore, Object, ResourceIdentity, ResourceKind, Store, StoreError};
use serde_json::json;

fn deployment(name: &str) -> Object {
  let mut object = Object::empty(ResourceIdentity::namespaced(
    ResourceKind::Deployment,
    "garden",
    name,
  ));
  object.labels.insert("app".into(), "virtual-garden".into());
  object.spec = json!({ "replicas": 1 });
  object
}

#[tokio::test]
async fn test_fs_store_lifecycle() {
  let dir = tempfile::tempdir().unwrap();
  let store = FsStore::new(dir.path());
  let id = deployment("kube-apiserver").identity;

  assert!(store.get(&id).await.unwrap().is_none());

  let created = store.create(deployment("kube-apiserver")).await.unwrap();
  assert_eq!(created.generation, 1);
  assert!(
    dir
      .path()
      .join("deployment/garden/kube-apiserver.json")
      .exists()
  );

  let mut changed = created.clone();
  changed.spec = json!({ "replicas": 3 });
  store.update(changed).await.unwrap();

  let stored = store.get(&id).await.unwrap().unwrap();
  assert_eq!(stored.spec, json!({ "replicas": 3 }));
  assert_eq!(stored.generation, 2);
  assert_eq!(stored.labels.get("app").map(String::as_str), Some("virtual-garden"));

  store.delete(&id).await.unwrap();
  assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_fs_store_persists_across_instances() {
  let dir = tempfile::tempdir().unwrap();
  let mut secret = Object::empty(ResourceIdentity::namespaced(
    ResourceKind::Secret,
    "garden",
    "basic-auth",
  ));
  secret.set_data("basic_auth.csv", vec![0u8, 159, 146, 150]);

  FsStore::new(dir.path()).create(secret).await.unwrap();

  let reopened = FsStore::new(dir.path());
  let stored = reopened
    .get(&ResourceIdentity::namespaced(
      ResourceKind::Secret,
      "garden",
      "basic-auth",
    ))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.data_value("basic_auth.csv"), Some(&[0u8, 159, 146, 150][..]));
}

#[tokio::test]
async fn test_fs_store_cluster_scope_and_list() {
  let dir = tempfile::tempdir().unwrap();
  let store = FsStore::new(dir.path());

  let ns = Object::empty(ResourceIdentity::cluster(ResourceKind::Namespace, "garden"));
  store.create(ns).await.unwrap();
  assert!(dir.path().join("namespace/_cluster/garden.json").exists());

  store.create(deployment("b")).await.unwrap();
  store.create(deployment("a")).await.unwrap();
  let names: Vec<String> = store
    .list(ResourceKind::Deployment, "garden")
    .await
    .unwrap()
    .into_iter()
    .map(|o| o.identity.name)
    .collect();
  assert_eq!(names, vec!["a", "b"]);

  assert!(store.list(ResourceKind::Secret, "garden").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fs_store_conflicts_and_idempotent_delete() {
  let dir = tempfile::tempdir().unwrap();
  let store = FsStore::new(dir.path());

  let created = store.create(deployment("x")).await.unwrap();
  assert!(matches!(
    store.create(deployment("x")).await,
    Err(StoreError::Conflict(_))
  ));

  store.update(created.clone()).await.unwrap();
  assert!(matches!(
    store.update(created).await,
    Err(StoreError::Conflict(_))
  ));

  let never = ResourceIdentity::namespaced(ResourceKind::Secret, "garden", "never-created");
  store.delete(&never).await.unwrap();
  store.delete(&never).await.unwrap();
}

#[tokio::test]
async fn test_fs_store_rejects_names_that_leave_their_directory() {
  let dir = tempfile::tempdir().unwrap();
  let base = dir.path().join("state");
  let store = FsStore::new(&base);

  let escaping = [
    ResourceIdentity::cluster(ResourceKind::BackupBucket, "../../../escaped"),
    ResourceIdentity::cluster(ResourceKind::BackupBucket, ".."),
    ResourceIdentity::cluster(ResourceKind::BackupBucket, ""),
    ResourceIdentity::namespaced(ResourceKind::Secret, "../garden", "pw"),
    ResourceIdentity::namespaced(ResourceKind::Secret, ".", "pw"),
    ResourceIdentity::namespaced(ResourceKind::Secret, "garden", "nested/pw"),
  ];
  for identity in escaping {
    let result = store.create(Object::empty(identity.clone())).await;
    assert!(
      matches!(result, Err(StoreError::Permanent { .. })),
      "{identity}: {result:?}"
    );
    assert!(matches!(
      store.get(&identity).await,
      Err(StoreError::Permanent { .. })
    ));
    assert!(matches!(
      store.delete(&identity).await,
      Err(StoreError::Permanent { .. })
    ));
  }
  assert!(!dir.path().join("escaped.json").exists());
  assert!(!base.exists());
}

#[tokio::test]
async fn test_fs_store_namespace_cannot_alias_cluster_scope() {
  let dir = tempfile::tempdir().unwrap();
  let store = FsStore::new(dir.path());

  store
    .create(Object::empty(ResourceIdentity::cluster(ResourceKind::Namespace, "x")))
    .await
    .unwrap();

  let aliased = ResourceIdentity::namespaced(ResourceKind::Namespace, "_cluster", "x");
  assert!(matches!(
    store.create(Object::empty(aliased)).await,
    Err(StoreError::Permanent { .. })
  ));
  assert!(matches!(
    store.list(ResourceKind::Namespace, "_cluster").await,
    Err(StoreError::Permanent { .. })
  ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_fs_store_keeps_documents_owner_only() {
  use std::os::unix::fs::PermissionsExt;

  let dir = tempfile::tempdir().unwrap();
  let base = dir.path().join("state");
  let store = FsStore::new(&base);

  let mut secret = Object::empty(ResourceIdentity::namespaced(
    ResourceKind::Secret,
    "ns",
    "pw",
  ));
  secret.set_data("k", "secret");
  let created = store.create(secret).await.unwrap();
  store.update(created).await.unwrap();

  let mode = |path: &str| {
    let metadata = std::fs::metadata(base.join(path)).unwrap();
    metadata.permissions().mode() & 0o777
  };
  assert_eq!(mode("secret/ns/pw.json"), 0o600);
  assert_eq!(mode("secret/ns"), 0o700);
  assert_eq!(mode("secret"), 0o700);
  assert_eq!(mode(""), 0o700);
}
