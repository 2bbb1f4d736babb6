//! The `Keystore` collaborator: per-type insert/lookup by public key hex.
//!
//! Holds every supported key type's secrets in memory, keyed by hex
//! public key, behind a single `RwLock`. On-disk persistence is out of
//! scope; this keystore is in-memory only.

use {
  std::collections::HashMap,
  thiserror::Error,
};

/// A four-byte consensus engine key type tag (e.g. `babe`, `gran`),
/// mirroring the `engine_id` shape already used for [`crate::block::DigestItem`].
pub type KeyTypeId = [u8; 4];

#[derive(Debug, Error)]
pub enum KeystoreError {
  #[error("key type {0:?} is not supported by this keystore")]
  KeyTypeNotSupported(KeyTypeId),

  #[error("invalid keystore name: {0}")]
  InvalidKeystoreName(String),
}

/// In-memory, multi-key-type keystore guarded by a single `RwLock`.
#[derive(Default)]
pub struct Keystore {
  keys: parking_lot::RwLock<HashMap<KeyTypeId, HashMap<String, Vec<u8>>>>,
  supported: Vec<KeyTypeId>,
}

impl Keystore {
  pub fn new(supported: Vec<KeyTypeId>) -> Self {
    Self {
      keys: parking_lot::RwLock::new(HashMap::new()),
      supported,
    }
  }

  fn check_supported(&self, key_type: KeyTypeId) -> Result<(), KeystoreError> {
    if self.supported.contains(&key_type) {
      Ok(())
    } else {
      Err(KeystoreError::KeyTypeNotSupported(key_type))
    }
  }

  /// Inserts a secret under `public_key_hex` for `key_type`.
  pub fn insert_key(
    &self,
    key_type: KeyTypeId,
    public_key_hex: &str,
    secret: Vec<u8>,
  ) -> Result<(), KeystoreError> {
    self.check_supported(key_type)?;
    self
      .keys
      .write()
      .entry(key_type)
      .or_default()
      .insert(public_key_hex.to_string(), secret);
    Ok(())
  }

  pub fn has_key(&self, key_type: KeyTypeId, public_key_hex: &str) -> bool {
    self
      .keys
      .read()
      .get(&key_type)
      .map(|m| m.contains_key(public_key_hex))
      .unwrap_or(false)
  }

  pub fn public_keys(&self, key_type: KeyTypeId) -> Vec<String> {
    self
      .keys
      .read()
      .get(&key_type)
      .map(|m| m.keys().cloned().collect())
      .unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const BABE: KeyTypeId = *b"babe";
  const GRAN: KeyTypeId = *b"gran";

  #[test]
  fn insert_and_has_key_roundtrip() {
    let ks = Keystore::new(vec![BABE]);
    ks.insert_key(BABE, "deadbeef", vec![1, 2, 3]).unwrap();
    assert!(ks.has_key(BABE, "deadbeef"));
    assert!(!ks.has_key(BABE, "cafe"));
  }

  #[test]
  fn unsupported_key_type_rejected() {
    let ks = Keystore::new(vec![BABE]);
    let err = ks.insert_key(GRAN, "deadbeef", vec![]).unwrap_err();
    assert!(matches!(err, KeystoreError::KeyTypeNotSupported(_)));
  }
}
