//! Fetch-mutate-upsert of store objects.

use garden_store::{Object, ResourceIdentity, Store};
use tracing::{debug, info};

use crate::error::{BoxError, ReconcileError};

/// What a reconciliation did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
  Created,
  Updated,
  /// The mutation produced the stored object unchanged; nothing was written.
  Unchanged,
}

impl ReconcileOutcome {
  pub fn as_str(&self) -> &'static str {
    match self {
      ReconcileOutcome::Created => "created",
      ReconcileOutcome::Updated => "updated",
      ReconcileOutcome::Unchanged => "unchanged",
    }
  }
}

/// Result of a successful reconciliation: the outcome and the object as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
  pub outcome: ReconcileOutcome,
  pub object: Object,
}

/// Ensure the object at `identity` exists and carries the state applied by `mutate`.
///
/// The current object is fetched first. If it is absent, `mutate` starts from
/// [`Object::empty`]; otherwise it starts from the stored object, so fields it
/// does not touch and previously generated values are preserved. `mutate` may
/// read those prior values, which is how generate-once secrets are carried
/// forward (see [`ensure_data`](crate::ensure_data)).
///
/// Absence is not an error at this layer; it selects the create branch. The
/// store arbitrates concurrent writers; a concurrent change surfaces as a
/// conflict error, which callers may retry.
pub async fn reconcile<S, F>(
  store: &S,
  identity: &ResourceIdentity,
  mutate: F,
) -> Result<Reconciled, ReconcileError>
where
  S: Store + ?Sized,
  F: FnOnce(&mut Object) -> Result<(), BoxError>,
{
  let current = store
    .get(identity)
    .await
    .map_err(|e| ReconcileError::store(identity, e))?;

  let mut desired = current
    .clone()
    .unwrap_or_else(|| Object::empty(identity.clone()));
  mutate(&mut desired).map_err(|source| ReconcileError::Mutate {
    identity: identity.clone(),
    source,
  })?;

  // Identity and generation belong to the store, not to the mutation.
  desired.identity = identity.clone();
  desired.generation = current.as_ref().map_or(0, |o| o.generation);

  let (outcome, object) = match current {
    None => {
      let object = store
        .create(desired)
        .await
        .map_err(|e| ReconcileError::store(identity, e))?;
      (ReconcileOutcome::Created, object)
    }
    Some(existing) if existing == desired => (ReconcileOutcome::Unchanged, existing),
    Some(_) => {
      let object = store
        .update(desired)
        .await
        .map_err(|e| ReconcileError::store(identity, e))?;
      (ReconcileOutcome::Updated, object)
    }
  };

  match outcome {
    ReconcileOutcome::Unchanged => debug!(identity = %identity, "object_unchanged"),
    _ => info!(identity = %identity, outcome = outcome.as_str(), "object_reconciled"),
  }

  Ok(Reconciled { outcome, object })
}

/// Delete every identity in order. Absent objects count as deleted.
pub async fn delete_all<S>(store: &S, identities: &[ResourceIdentity]) -> Result<(), ReconcileError>
where
  S: Store + ?Sized,
{
  for identity in identities {
    store
      .delete(identity)
      .await
      .map_err(|e| ReconcileError::store(identity, e))?;
    info!(identity = %identity, "object_deleted");
  }
  Ok(())
}
