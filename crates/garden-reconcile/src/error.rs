//! Error types for reconciliation.

use garden_store::{ResourceIdentity, StoreError};
use thiserror::Error;

/// Boxed error returned by mutation functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while reconciling or deleting an object.
#[derive(Debug, Error)]
pub enum ReconcileError {
  /// The store rejected a read or write.
  #[error("store error for {identity}: {source}")]
  Store {
    identity: ResourceIdentity,
    #[source]
    source: StoreError,
  },

  /// The mutation function failed; nothing was written.
  #[error("failed to mutate {identity}: {source}")]
  Mutate {
    identity: ResourceIdentity,
    #[source]
    source: BoxError,
  },
}

impl ReconcileError {
  pub(crate) fn store(identity: &ResourceIdentity, source: StoreError) -> Self {
    ReconcileError::Store {
      identity: identity.clone(),
      source,
    }
  }

  /// Whether the underlying store error may go away on retry.
  pub fn is_transient(&self) -> bool {
    match self {
      ReconcileError::Store { source, .. } => source.is_transient(),
      ReconcileError::Mutate { .. } => false,
    }
  }
}

/// Failure to obtain random secret material.
#[derive(Debug, Error)]
#[error("secret generation failed: {message}")]
pub struct SecretError {
  pub message: String,
}
