//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler or extractor.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Missing, malformed, expired or revoked credentials.
  #[error("{0}")]
  Unauthorized(&'static str),

  /// The request body could not be read as the expected JSON shape.
  #[error("{0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] pickup_core::Error),
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

impl ApiError {
  pub fn unauthenticated() -> Self { Self::Unauthorized("not authorized to access this route") }

  pub fn invalid_credentials() -> Self { Self::Unauthorized("invalid credentials") }
}

/// Lift a store backend's error into the API error.
pub fn store_error<E: Into<pickup_core::Error>>(e: E) -> ApiError { ApiError::Core(e.into()) }

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    use pickup_core::Error as Core;

    let (status, message) = match self {
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.to_string()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
      ApiError::Core(e) => match e {
        Core::NotFound(m) => (StatusCode::NOT_FOUND, m),
        Core::Forbidden(m) => (StatusCode::FORBIDDEN, m),
        Core::InvalidInput(m) => (StatusCode::BAD_REQUEST, m),
        Core::InvalidOrExpired => (StatusCode::BAD_REQUEST, Core::InvalidOrExpired.to_string()),
        Core::Conflict(m) => (StatusCode::CONFLICT, m),
        Core::Render(m) => {
          tracing::error!(error = %m, "pickup code rendering failed");
          (StatusCode::INTERNAL_SERVER_ERROR, "failed to render pickup code".to_string())
        }
        Core::Store(e) => {
          tracing::error!(error = %e, "storage failure");
          (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
        }
      },
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
