use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a stored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
  Namespace,
  Secret,
  Service,
  Deployment,
  StatefulSet,
  StorageClass,
  BackupBucket,
  PersistentVolumeClaim,
}

impl ResourceKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceKind::Namespace => "namespace",
      ResourceKind::Secret => "secret",
      ResourceKind::Service => "service",
      ResourceKind::Deployment => "deployment",
      ResourceKind::StatefulSet => "stateful_set",
      ResourceKind::StorageClass => "storage_class",
      ResourceKind::BackupBucket => "backup_bucket",
      ResourceKind::PersistentVolumeClaim => "persistent_volume_claim",
    }
  }

  /// Cluster-scoped kinds have no namespace.
  pub fn is_cluster_scoped(&self) -> bool {
    matches!(
      self,
      ResourceKind::Namespace | ResourceKind::StorageClass | ResourceKind::BackupBucket
    )
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Stable handle of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
  pub kind: ResourceKind,
  /// Empty for cluster-scoped kinds.
  #[serde(default)]
  pub namespace: String,
  pub name: String,
}

impl ResourceIdentity {
  /// Identity of a namespaced object.
  pub fn namespaced(
    kind: ResourceKind,
    namespace: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      kind,
      namespace: namespace.into(),
      name: name.into(),
    }
  }

  /// Identity of a cluster-scoped object.
  pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
    Self {
      kind,
      namespace: String::new(),
      name: name.into(),
    }
  }
}

impl fmt::Display for ResourceIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.namespace.is_empty() {
      write!(f, "{}/{}", self.kind, self.name)
    } else {
      write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
  }
}

/// A stored resource.
///
/// `data` holds opaque payloads (secret material, config blobs); `spec`
/// holds the structured desired state of workloads and other resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
  pub identity: ResourceIdentity,
  #[serde(default)]
  pub labels: BTreeMap<String, String>,
  #[serde(default)]
  pub annotations: BTreeMap<String, String>,
  #[serde(default)]
  pub data: BTreeMap<String, Vec<u8>>,
  #[serde(default)]
  pub spec: serde_json::Value,
  /// Set by the store; 0 for objects that were never persisted.
  #[serde(default)]
  pub generation: u64,
}

impl Object {
  /// An object carrying only its identity.
  pub fn empty(identity: ResourceIdentity) -> Self {
    Self {
      identity,
      labels: BTreeMap::new(),
      annotations: BTreeMap::new(),
      data: BTreeMap::new(),
      spec: serde_json::Value::Null,
      generation: 0,
    }
  }

  /// Get a data entry.
  pub fn data_value(&self, key: &str) -> Option<&[u8]> {
    self.data.get(key).map(Vec::as_slice)
  }

  /// Set a data entry.
  pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
    self.data.insert(key.into(), value.into());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identity_display() {
    let secret = ResourceIdentity::namespaced(ResourceKind::Secret, "garden", "basic-auth");
    assert_eq!(secret.to_string(), "secret/garden/basic-auth");

    let ns = ResourceIdentity::cluster(ResourceKind::Namespace, "garden");
    assert_eq!(ns.to_string(), "namespace/garden");
  }

  #[test]
  fn test_object_json_roundtrip_keeps_defaults() {
    let json = r#"{"identity":{"kind":"secret","namespace":"ns","name":"s"}}"#;
    let object: Object = serde_json::from_str(json).unwrap();
    assert_eq!(
      object,
      Object::empty(ResourceIdentity::namespaced(ResourceKind::Secret, "ns", "s"))
    );
  }
}
