use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{Object, ResourceIdentity, ResourceKind, Store, StoreError};

const CLUSTER_SCOPE_DIR: &str = "_cluster";

/// Owner-only permissions for stored documents and their directories.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Filesystem-based store.
///
/// Each object is stored as a JSON document at
/// `{base_path}/{kind}/{namespace}/{name}.json`, with cluster-scoped objects
/// under the `_cluster` directory. Writes go through a temporary file and a
/// rename so readers never observe partial documents. Namespaces and names
/// must be single path components; anything else is rejected as permanent.
pub struct FsStore {
  base_path: PathBuf,
  /// Serializes check-then-write sequences within this process.
  write_lock: Mutex<()>,
}

impl FsStore {
  /// Create a new filesystem store with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
      write_lock: Mutex::new(()),
    }
  }

  fn scope_dir(&self, kind: ResourceKind, namespace: &str) -> Result<PathBuf, StoreError> {
    let scope = if namespace.is_empty() {
      CLUSTER_SCOPE_DIR
    } else {
      path_component("namespace", namespace)?
    };
    Ok(self.base_path.join(kind.as_str()).join(scope))
  }

  fn object_path(&self, identity: &ResourceIdentity) -> Result<PathBuf, StoreError> {
    let name = path_component("name", &identity.name)?;
    Ok(
      self
        .scope_dir(identity.kind, &identity.namespace)?
        .join(format!("{name}.json")),
    )
  }

  async fn read(&self, identity: &ResourceIdentity) -> Result<Option<Object>, StoreError> {
    match fs::read(self.object_path(identity)?).await {
      Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(StoreError::Io(e)),
    }
  }

  async fn write(&self, object: &Object) -> Result<(), StoreError> {
    let path = self.object_path(&object.identity)?;
    if let Some(parent) = path.parent() {
      create_private_dir(parent).await?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    let mut file = options.open(&tmp).await?;
    file.write_all(&serde_json::to_vec_pretty(object)?).await?;
    file.flush().await?;
    drop(file);

    fs::rename(&tmp, &path).await?;
    Ok(())
  }
}

/// Check that `value` maps onto exactly one directory entry of its own.
fn path_component<'a>(field: &str, value: &'a str) -> Result<&'a str, StoreError> {
  let valid = !value.is_empty()
    && value != "."
    && value != ".."
    && value != CLUSTER_SCOPE_DIR
    && !value.contains(['/', '\\', '\0']);
  if valid {
    Ok(value)
  } else {
    Err(StoreError::Permanent {
      message: format!("{field} {value:?} is not a valid path component"),
    })
  }
}

async fn create_private_dir(path: &Path) -> std::io::Result<()> {
  let mut builder = fs::DirBuilder::new();
  builder.recursive(true);
  #[cfg(unix)]
  builder.mode(DIR_MODE);
  builder.create(path).await
}

#[async_trait]
impl Store for FsStore {
  async fn get(&self, identity: &ResourceIdentity) -> Result<Option<Object>, StoreError> {
    self.read(identity).await
  }

  async fn create(&self, mut object: Object) -> Result<Object, StoreError> {
    let _guard = self.write_lock.lock().await;
    if self.read(&object.identity).await?.is_some() {
      return Err(StoreError::Conflict(object.identity.to_string()));
    }

    object.generation = 1;
    self.write(&object).await?;
    debug!(identity = %object.identity, "object created");
    Ok(object)
  }

  async fn update(&self, mut object: Object) -> Result<Object, StoreError> {
    let _guard = self.write_lock.lock().await;
    let Some(current) = self.read(&object.identity).await? else {
      return Err(StoreError::NotFound(object.identity.to_string()));
    };
    if current.generation != object.generation {
      return Err(StoreError::Conflict(format!(
        "{} changed (generation {} != {})",
        object.identity, current.generation, object.generation
      )));
    }

    object.generation += 1;
    self.write(&object).await?;
    debug!(identity = %object.identity, generation = object.generation, "object updated");
    Ok(object)
  }

  async fn delete(&self, identity: &ResourceIdentity) -> Result<(), StoreError> {
    let _guard = self.write_lock.lock().await;
    match fs::remove_file(self.object_path(identity)?).await {
      Ok(()) => {
        debug!(identity = %identity, "object deleted");
        Ok(())
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(StoreError::Io(e)),
    }
  }

  async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Object>, StoreError> {
    let dir = self.scope_dir(kind, namespace)?;
    let mut entries = match fs::read_dir(&dir).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(StoreError::Io(e)),
    };

    let mut objects = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "json") {
        let bytes = fs::read(&path).await?;
        objects.push(serde_json::from_slice::<Object>(&bytes)?);
      }
    }
    objects.sort_by(|a, b| a.identity.name.cmp(&b.identity.name));
    Ok(objects)
  }
}
