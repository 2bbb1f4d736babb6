use {crate::primitives::Hash, thiserror::Error};

/// Errors raised by [`super::BlockTree`] operations.
#[derive(Debug, Error)]
pub enum TreeError {
  #[error("block {0} has no known parent in the tree")]
  ParentNotFound(Hash),

  #[error("block {0} is already present in the tree")]
  BlockAlreadyExists(Hash),

  #[error("block {0} is not on the path between the queried nodes")]
  NotOnPath(Hash),

  #[error("the two chains share no common ancestor in the tree")]
  DisjointChains,
}
