//! Error types for `qcboard-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A write carried a missing, blank, or out-of-range field.
  #[error("validation error: {0}")]
  Validation(String),

  #[error("machine not found: {0}")]
  NotFound(String),

  #[error("invalid date: {0:?}")]
  InvalidDate(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
