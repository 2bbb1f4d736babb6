use thiserror::Error;

/// Errors raised by the block-announce protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
  #[error("peer genesis hash does not match ours")]
  GenesisMismatch,

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to decode wire message: {0}")]
  Decode(String),

  #[error("peer session not found")]
  SessionNotFound,
}
