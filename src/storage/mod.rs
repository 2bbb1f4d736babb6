//! The `StorageState` collaborator: trie-state access and proof
//! generation. The trie itself (on-disk persistence, real Merkle proof
//! construction) is delegated to the database; this module defines the
//! trait boundary plus one production-shaped backend (`sled`, keyed by
//! state root over an arbitrary key-value snapshot) and one in-memory
//! backend for tests.

mod error;
mod sled_backend;

pub use {error::StorageError, sled_backend::SledStorage};

use {crate::primitives::Hash, std::collections::BTreeMap};

/// A flat key-value snapshot of trie state at some root. The actual
/// Merkle-Patricia structure over these entries is out of scope here; this
/// is the state the codec in [`crate::codec`] would serialize into trie
/// nodes.
pub type TrieState = BTreeMap<Vec<u8>, Vec<u8>>;

/// Computes the state root of a snapshot. Not a real trie root — a
/// deterministic placeholder over the sorted key-value pairs, since the
/// trie's persistence and root computation belong to the database layer
/// this kernel treats as an external collaborator.
pub fn compute_state_root(state: &TrieState) -> Hash {
  let mut buf = Vec::new();
  for (k, v) in state {
    buf.extend_from_slice(&(k.len() as u64).to_le_bytes());
    buf.extend_from_slice(k);
    buf.extend_from_slice(&(v.len() as u64).to_le_bytes());
    buf.extend_from_slice(v);
  }
  Hash::digest(&buf)
}

/// Trie-state access and mutation: fetch by root, store a snapshot and
/// compute its root, and generate a proof over a set of keys.
pub trait StorageState: Send + Sync {
  fn trie_state(&self, root: Hash) -> Result<TrieState, StorageError>;
  fn store_trie(&self, state: &TrieState) -> Result<Hash, StorageError>;
  fn generate_trie_proof(
    &self,
    root: Hash,
    keys: &[Vec<u8>],
  ) -> Result<Vec<Vec<u8>>, StorageError>;
}

/// An in-memory `StorageState`, used by the facade's tests.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
  roots: parking_lot::RwLock<std::collections::HashMap<Hash, TrieState>>,
}

impl InMemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StorageState for InMemoryStorage {
  fn trie_state(&self, root: Hash) -> Result<TrieState, StorageError> {
    self
      .roots
      .read()
      .get(&root)
      .cloned()
      .ok_or(StorageError::UnknownRoot(root))
  }

  fn store_trie(&self, state: &TrieState) -> Result<Hash, StorageError> {
    let root = compute_state_root(state);
    self.roots.write().insert(root, state.clone());
    Ok(root)
  }

  fn generate_trie_proof(
    &self,
    root: Hash,
    keys: &[Vec<u8>],
  ) -> Result<Vec<Vec<u8>>, StorageError> {
    let state = self.trie_state(root)?;
    Ok(
      keys
        .iter()
        .map(|k| state.get(k).cloned().unwrap_or_default())
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_then_fetch_roundtrips() {
    let storage = InMemoryStorage::new();
    let mut state = TrieState::new();
    state.insert(b"k1".to_vec(), b"v1".to_vec());
    let root = storage.store_trie(&state).unwrap();
    assert_eq!(storage.trie_state(root).unwrap(), state);
  }

  #[test]
  fn unknown_root_fails() {
    let storage = InMemoryStorage::new();
    assert!(matches!(
      storage.trie_state(Hash::ZERO),
      Err(StorageError::UnknownRoot(_))
    ));
  }
}
