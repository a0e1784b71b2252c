//! Secret material generation with generate-once semantics.

use std::sync::Mutex;

use garden_store::Object;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

use crate::error::{BoxError, SecretError};

const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Source of randomness for generated secret material.
///
/// Only consulted when a value is generated for the first time.
pub trait SecretSource: Send + Sync {
  fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), SecretError>;
}

/// Operating system entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSecretSource;

impl SecretSource for OsSecretSource {
  fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), SecretError> {
    OsRng.try_fill_bytes(dest).map_err(|e| SecretError {
      message: e.to_string(),
    })
  }
}

/// Deterministic source seeded from a `u64`, for tests and reproducible runs.
#[derive(Debug)]
pub struct SeededSecretSource {
  rng: Mutex<StdRng>,
}

impl SeededSecretSource {
  pub fn new(seed: u64) -> Self {
    Self {
      rng: Mutex::new(StdRng::seed_from_u64(seed)),
    }
  }
}

impl SecretSource for SeededSecretSource {
  fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), SecretError> {
    let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
    rng.fill_bytes(dest);
    Ok(())
  }
}

/// Generate `len` random bytes.
pub fn generate_key(source: &dyn SecretSource, len: usize) -> Result<Vec<u8>, SecretError> {
  let mut key = vec![0u8; len];
  source.fill_bytes(&mut key)?;
  Ok(key)
}

/// Generate an alphanumeric password of `len` characters.
pub fn generate_password(source: &dyn SecretSource, len: usize) -> Result<String, SecretError> {
  // Largest multiple of the alphabet size that fits in a byte; bytes above it
  // are rejected to keep the distribution uniform.
  let limit = (256 / PASSWORD_ALPHABET.len() * PASSWORD_ALPHABET.len()) as u8;

  let mut password = String::with_capacity(len);
  let mut buf = [0u8; 64];
  while password.len() < len {
    source.fill_bytes(&mut buf)?;
    for &b in buf.iter().filter(|&&b| b < limit) {
      if password.len() == len {
        break;
      }
      password.push(PASSWORD_ALPHABET[b as usize % PASSWORD_ALPHABET.len()] as char);
    }
  }
  Ok(password)
}

/// Keep `object.data[key]` if present, otherwise set it from `generate`.
///
/// Returns `true` when a new value was generated. Use this inside a
/// [`reconcile`](crate::reconcile) mutation for material that must be
/// created exactly once, such as passwords and encryption keys.
pub fn ensure_data<F>(object: &mut Object, key: &str, generate: F) -> Result<bool, BoxError>
where
  F: FnOnce() -> Result<Vec<u8>, BoxError>,
{
  if object.data.contains_key(key) {
    return Ok(false);
  }
  let value = generate()?;
  object.data.insert(key.to_string(), value);
  Ok(true)
}
