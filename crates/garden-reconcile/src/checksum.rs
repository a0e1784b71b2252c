//! Content fingerprints and checksum annotations.

use std::collections::BTreeMap;

use garden_store::Object;
use sha2::{Digest, Sha256};

/// Deterministic SHA-256 fingerprint of `content`, as 64 lowercase hex chars.
pub fn fingerprint(content: &[u8]) -> String {
  hex::encode(Sha256::digest(content))
}

/// Fingerprint of an object's payload (`data` entries in key order and `spec`).
///
/// Labels, annotations and generation are not part of the fingerprint, so
/// stamping a checksum onto an object does not change its own checksum.
pub fn fingerprint_object(object: &Object) -> String {
  let mut hasher = Sha256::new();
  for (key, value) in &object.data {
    hasher.update((key.len() as u64).to_be_bytes());
    hasher.update(key.as_bytes());
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value);
  }
  if !object.spec.is_null() {
    hasher.update(object.spec.to_string().as_bytes());
  }
  hex::encode(hasher.finalize())
}

/// Fingerprints of generated artifacts, keyed by symbolic name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checksums {
  entries: BTreeMap<String, String>,
}

impl Checksums {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fingerprint `content` and store it under `key`.
  pub fn record(&mut self, key: impl Into<String>, content: impl AsRef<[u8]>) -> &str {
    let key = key.into();
    let value = fingerprint(content.as_ref());
    self.entries.insert(key.clone(), value);
    &self.entries[&key]
  }

  /// Fingerprint an object's payload and store it under `key`.
  pub fn record_object(&mut self, key: impl Into<String>, object: &Object) -> &str {
    let key = key.into();
    self.entries.insert(key.clone(), fingerprint_object(object));
    &self.entries[&key]
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(key).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  /// Project the checksums of `keys` into an annotation map.
  ///
  /// Keys without a recorded checksum are left out. A workload carrying these
  /// annotations is rolled whenever any watched fingerprint changes.
  pub fn stamp_annotations(&self, keys: &[&str]) -> BTreeMap<String, String> {
    keys
      .iter()
      .filter_map(|&key| self.entries.get(key).map(|v| (key.to_string(), v.clone())))
      .collect()
  }
}
