//! Error type for `pickup-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decode error: {0}")]
  Decode(String),

  /// A uniqueness constraint (email, student number) would be violated.
  #[error("{0}")]
  Conflict(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for pickup_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Conflict(msg) => pickup_core::Error::Conflict(msg),
      other => pickup_core::Error::Store(Box::new(other)),
    }
  }
}
