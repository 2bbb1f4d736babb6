use thiserror::Error;

/// The composed error type at the facade boundary, wrapping each
/// sub-module's error with `#[from]` conversions.
#[derive(Debug, Error)]
pub enum FacadeError {
  #[error(transparent)]
  Tree(#[from] crate::tree::TreeError),

  #[error(transparent)]
  Runtime(#[from] crate::runtime::RuntimeError),

  #[error(transparent)]
  Reorg(#[from] crate::reorg::ReorgError),

  #[error(transparent)]
  Storage(#[from] crate::storage::StorageError),

  #[error(transparent)]
  Keystore(#[from] crate::keystore::KeystoreError),

  #[error("extrinsic rejected by the runtime: {0:?}")]
  ExtrinsicRejected(crate::runtime::InvalidTransaction),

  #[error("block {0} is unknown to this facade")]
  UnknownBlock(crate::primitives::Hash),
}
