use thiserror::Error;

/// Errors raised by the chain reorg controller.
#[derive(Debug, Error)]
pub enum ReorgError {
  #[error("old and new head share no common ancestor in the tree")]
  DisjointChains,

  #[error("tree error during reorg: {0}")]
  Tree(#[from] crate::tree::TreeError),

  #[error("block body missing for {0} during reorg replay")]
  MissingBody(crate::primitives::Hash),
}
