//! Garden Reconcile
//!
//! This crate provides the idempotent mutation layer every provisioning task
//! relies on:
//! - [`reconcile`]: fetch an object, apply a mutation, create or update it
//! - generate-once helpers so secret material survives repeated passes
//! - [`Checksums`]: content fingerprints stamped onto dependent workloads

mod checksum;
mod error;
mod reconcile;
mod secret;

pub use checksum::{Checksums, fingerprint, fingerprint_object};
pub use error::{BoxError, ReconcileError, SecretError};
pub use reconcile::{ReconcileOutcome, Reconciled, delete_all, reconcile};
pub use secret::{
  OsSecretSource, SecretSource, SeededSecretSource, ensure_data, generate_key, generate_password,
};
