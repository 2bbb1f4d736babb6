use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("serialization error: {0}")]
  Serialization(#[from] bincode::Error),

  #[error("storage engine error: {0}")]
  Engine(#[from] sled::Error),

  #[error("system io error: {0}")]
  SystemIo(#[from] std::io::Error),

  #[error("no trie state recorded for root {0}")]
  UnknownRoot(crate::primitives::Hash),
}
