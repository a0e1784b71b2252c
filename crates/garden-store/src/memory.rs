use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Object, ResourceIdentity, ResourceKind, Store, StoreError};

/// In-memory store implementation.
///
/// Suitable for tests and dry runs. State is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStore {
  objects: RwLock<BTreeMap<ResourceIdentity, Object>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored objects.
  pub async fn len(&self) -> usize {
    self.objects.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.objects.read().await.is_empty()
  }
}

#[async_trait]
impl Store for InMemoryStore {
  async fn get(&self, identity: &ResourceIdentity) -> Result<Option<Object>, StoreError> {
    Ok(self.objects.read().await.get(identity).cloned())
  }

  async fn create(&self, mut object: Object) -> Result<Object, StoreError> {
    let mut objects = self.objects.write().await;
    if objects.contains_key(&object.identity) {
      return Err(StoreError::Conflict(object.identity.to_string()));
    }

    object.generation = 1;
    debug!(identity = %object.identity, "object created");
    objects.insert(object.identity.clone(), object.clone());
    Ok(object)
  }

  async fn update(&self, mut object: Object) -> Result<Object, StoreError> {
    let mut objects = self.objects.write().await;
    let Some(current) = objects.get(&object.identity) else {
      return Err(StoreError::NotFound(object.identity.to_string()));
    };
    if current.generation != object.generation {
      return Err(StoreError::Conflict(format!(
        "{} changed (generation {} != {})",
        object.identity, current.generation, object.generation
      )));
    }

    object.generation += 1;
    debug!(identity = %object.identity, generation = object.generation, "object updated");
    objects.insert(object.identity.clone(), object.clone());
    Ok(object)
  }

  async fn delete(&self, identity: &ResourceIdentity) -> Result<(), StoreError> {
    if self.objects.write().await.remove(identity).is_some() {
      debug!(identity = %identity, "object deleted");
    }
    Ok(())
  }

  async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Object>, StoreError> {
    Ok(
      self
        .objects
        .read()
        .await
        .values()
        .filter(|o| o.identity.kind == kind && o.identity.namespace == namespace)
        .cloned()
        .collect(),
    )
  }
}
