use {
  super::{compute_state_root, StorageError, StorageState, TrieState},
  crate::primitives::Hash,
  std::path::Path,
};

/// A `sled`-backed `StorageState`. One tree (`sled`'s own namespacing, not
/// to be confused with the block tree) keyed by state root, storing the
/// `bincode`-serialized snapshot.
pub struct SledStorage {
  roots: sled::Tree,
}

impl SledStorage {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, StorageError> {
    let db = sled::open(directory)?;
    let roots = db.open_tree("trie_roots")?;
    Ok(Self { roots })
  }
}

impl StorageState for SledStorage {
  fn trie_state(&self, root: Hash) -> Result<TrieState, StorageError> {
    match self.roots.get(root.as_bytes())? {
      Some(bytes) => Ok(bincode::deserialize(&bytes)?),
      None => Err(StorageError::UnknownRoot(root)),
    }
  }

  fn store_trie(&self, state: &TrieState) -> Result<Hash, StorageError> {
    let root = compute_state_root(state);
    let bytes = bincode::serialize(state)?;
    self.roots.insert(root.as_bytes(), bytes)?;
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
  fn roundtrips_through_disk() {
    let dir = tempfile_dir();
    let storage = SledStorage::open(&dir).unwrap();
    let mut state = TrieState::new();
    state.insert(b"a".to_vec(), b"1".to_vec());
    let root = storage.store_trie(&state).unwrap();
    assert_eq!(storage.trie_state(root).unwrap(), state);
  }

  fn tempfile_dir() -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("kernel-sled-test-{}", std::process::id()));
    dir
  }
}
