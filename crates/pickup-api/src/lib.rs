//! JSON REST API for the school pickup service.
//!
//! Exposes an axum [`Router`] under `/api/v1`, backed by any
//! [`PickupStore`]. Every route except `/health`, `/auth/register` and
//! `/auth/login` requires `Authorization: Bearer <token>`.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = pickup_api::router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod error;
pub mod guardians;
pub mod pickups;
pub mod render;
pub mod students;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::FromRequest,
  http::StatusCode,
  response::IntoResponse,
  routing::{get, post},
};
use pickup_core::{render::CodeRenderer, store::PickupStore, sync::SyncReport};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `PICKUP_*` environment.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// Lifetime of a login session.
  pub session_ttl_hours: i64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".to_string(),
      port:              5000,
      store_path:        PathBuf::from("pickup.db"),
      session_ttl_hours: 720,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: PickupStore> {
  pub store:    Arc<S>,
  pub renderer: Arc<dyn CodeRenderer>,
  pub config:   Arc<ServerConfig>,
}

/// `axum::Json`, but rejections come back as [`ApiError`] so every error
/// body has the same shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Log a synchroniser pass that left some counterparts behind.
pub(crate) fn report_sync(kind: &str, id: Uuid, report: &SyncReport) {
  if report.is_complete() {
    return;
  }
  for failure in &report.failures {
    tracing::warn!(
      %kind,
      %id,
      counterpart = %failure.counterpart,
      reason = %failure.reason,
      "relationship sync left a counterpart unchanged"
    );
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full HTTP router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: PickupStore + Clone + 'static,
{
  let api = Router::new()
    .route("/health", get(health))
    // Auth
    .route("/auth/register", post(auth::register::<S>))
    .route("/auth/login", post(auth::login::<S>))
    .route("/auth/me", get(auth::me::<S>))
    .route("/auth/logout", post(auth::logout::<S>))
    // Guardians
    .route("/guardians", get(guardians::list::<S>).post(guardians::create::<S>))
    .route(
      "/guardians/{id}",
      get(guardians::get_one::<S>)
        .put(guardians::update::<S>)
        .delete(guardians::delete::<S>),
    )
    // Students
    .route("/students", get(students::list::<S>).post(students::create::<S>))
    .route(
      "/students/{id}",
      get(students::get_one::<S>)
        .put(students::update::<S>)
        .delete(students::delete::<S>),
    )
    // Codes
    .route(
      "/students/{id}/guardians/{guardian_id}/qrcode",
      get(pickups::guardian_code::<S>),
    )
    .route(
      "/students/{id}/authorized-pickup/{pickup_id}/qrcode",
      get(pickups::pickup_person_code::<S>),
    )
    // Verification
    .route("/verify-pickup", post(pickups::verify::<S>))
    .route("/verify-authorized-pickup", post(pickups::verify_pickup_person::<S>))
    .route("/logs", get(pickups::list_logs::<S>));

  Router::new()
    .nest("/api/v1", api)
    .fallback(not_found)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn health() -> impl IntoResponse { Json(json!({ "status": "ok" })) }

async fn not_found() -> impl IntoResponse {
  (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

#[cfg(test)]
mod tests;
