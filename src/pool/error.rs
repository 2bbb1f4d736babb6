use thiserror::Error;

/// Errors raised by the transaction pool.
#[derive(Debug, Error)]
pub enum PoolError {
  #[error("extrinsic validation failed: {0}")]
  ValidationFailed(String),
}
