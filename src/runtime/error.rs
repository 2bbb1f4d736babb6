use {crate::primitives::Hash, thiserror::Error};

/// Errors raised by the runtime registry.
#[derive(Debug, Error)]
pub enum RuntimeError {
  #[error("no runtime instance registered for block {0}")]
  NotFound(Hash),

  #[error("block {0} already has a different runtime instance bound")]
  ConflictingBinding(Hash),

  #[error("runtime call failed: {0}")]
  ExecutionFailed(String),

  #[error("runtime call timed out")]
  Timeout,

  #[error("operation was cancelled")]
  Cancelled,
}
