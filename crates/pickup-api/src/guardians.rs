//! Handlers for `/guardians` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/guardians` | Admin; guardian-role accounts only |
//! | `POST`   | `/guardians` | Admin; any role, default guardian |
//! | `GET`    | `/guardians/{id}` | Self or admin |
//! | `PUT`    | `/guardians/{id}` | Self or admin; `role`/`children` admin-only |
//! | `DELETE` | `/guardians/{id}` | Admin |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use pickup_core::{
  directory::{self, Synced},
  guardian::{Guardian, GuardianPatch, NewGuardian, Role},
  store::PickupStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState, JsonBody,
  auth::{Authenticated, hash_password},
  error::Result,
  report_sync,
};

/// `GET /guardians`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
) -> Result<Json<Vec<Guardian>>>
where
  S: PickupStore + Clone + 'static,
{
  Ok(Json(directory::list_guardians(&*state.store, &auth.principal).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:     String,
  pub email:    String,
  pub password: String,
  #[serde(default)]
  pub phone:    Option<String>,
  #[serde(default)]
  pub role:     Role,
  #[serde(default)]
  pub photo:    Option<String>,
  #[serde(default)]
  pub children: Vec<Uuid>,
}

/// `POST /guardians`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<impl IntoResponse>
where
  S: PickupStore + Clone + 'static,
{
  pickup_core::policy::manage_directory(&auth.principal)?;
  let password_hash = hash_password(&body.password)?;

  let out = directory::create_guardian(&*state.store, &auth.principal, NewGuardian {
    name: body.name,
    email: body.email,
    phone: body.phone,
    role: body.role,
    photo: body.photo,
    password_hash,
    children: body.children,
  })
  .await?;

  report_sync("guardian", out.record.guardian_id, &out.sync);
  Ok((StatusCode::CREATED, Json(out)))
}

/// `GET /guardians/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Guardian>>
where
  S: PickupStore + Clone + 'static,
{
  Ok(Json(directory::get_guardian(&*state.store, &auth.principal, id).await?))
}

/// `PUT /guardians/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(patch): JsonBody<GuardianPatch>,
) -> Result<Json<Synced<Guardian>>>
where
  S: PickupStore + Clone + 'static,
{
  let out = directory::update_guardian(&*state.store, &auth.principal, id, patch).await?;
  report_sync("guardian", id, &out.sync);
  Ok(Json(out))
}

/// `DELETE /guardians/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode>
where
  S: PickupStore + Clone + 'static,
{
  directory::delete_guardian(&*state.store, &auth.principal, id).await?;
  tracing::info!(guardian = %id, "guardian deleted");
  Ok(StatusCode::NO_CONTENT)
}
