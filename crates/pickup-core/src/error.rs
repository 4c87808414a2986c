//! Error types for `pickup-core`.

use thiserror::Error;

/// Every failure a core operation can report to its caller.
#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  InvalidInput(String),

  #[error("invalid or expired pickup code")]
  InvalidOrExpired,

  #[error("{0}")]
  Conflict(String),

  #[error("failed to render pickup code: {0}")]
  Render(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(what: impl std::fmt::Display) -> Self {
    Self::NotFound(format!("{what} not found"))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
