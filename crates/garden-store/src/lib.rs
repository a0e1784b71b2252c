//! Garden Store
//!
//! This crate provides the resource store abstraction used by the virtual
//! garden operations. Objects are addressed by a [`ResourceIdentity`]
//! (`kind`, `namespace`, `name`) and persisted by a [`Store`] backend.
//!
//! The [`Store`] trait defines the platform/backend layer. Implementations:
//! - [`InMemoryStore`] for tests and dry runs
//! - [`FsStore`] keeping one JSON document per object on disk
//!
//! All durable state of an operation lives in the store; nothing is cached
//! across calls.

mod fs;
mod memory;
mod types;

pub use fs::FsStore;
pub use memory::InMemoryStore;
pub use types::{Object, ResourceIdentity, ResourceKind};

use async_trait::async_trait;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The object does not exist.
  #[error("not found: {0}")]
  NotFound(String),

  /// The object already exists, or was changed since it was read.
  #[error("conflict: {0}")]
  Conflict(String),

  /// A failure that may succeed when retried.
  #[error("transient store error: {message}")]
  Transient { message: String },

  /// A failure that will not go away on retry.
  #[error("permanent store error: {message}")]
  Permanent { message: String },

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A stored document could not be encoded or decoded.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl StoreError {
  /// Whether retrying the call may succeed.
  ///
  /// The store only classifies; retry policy belongs to the caller.
  pub fn is_transient(&self) -> bool {
    match self {
      StoreError::Transient { .. } | StoreError::Conflict(_) => true,
      StoreError::Io(e) => matches!(
        e.kind(),
        std::io::ErrorKind::Interrupted
          | std::io::ErrorKind::TimedOut
          | std::io::ErrorKind::WouldBlock
      ),
      _ => false,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, StoreError::NotFound(_))
  }
}

/// Storage trait for resource objects.
///
/// Implementations must give at-most-one-writer-wins semantics per identity:
/// `update` only succeeds when the object's `generation` matches the stored one.
#[async_trait]
pub trait Store: Send + Sync {
  /// Fetch an object. Absence is `Ok(None)`, not an error.
  async fn get(&self, identity: &ResourceIdentity) -> Result<Option<Object>, StoreError>;

  /// Create an object. Fails with [`StoreError::Conflict`] if it exists.
  ///
  /// Returns the stored object with its generation set to 1.
  async fn create(&self, object: Object) -> Result<Object, StoreError>;

  /// Replace an existing object.
  ///
  /// Fails with [`StoreError::NotFound`] if absent and with
  /// [`StoreError::Conflict`] if the stored generation differs from the
  /// object's. Returns the stored object with its generation incremented.
  async fn update(&self, object: Object) -> Result<Object, StoreError>;

  /// Delete an object. Deleting an absent object succeeds.
  async fn delete(&self, identity: &ResourceIdentity) -> Result<(), StoreError>;

  /// List objects of a kind in a namespace (empty for cluster-scoped kinds).
  async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Object>, StoreError>;
}
