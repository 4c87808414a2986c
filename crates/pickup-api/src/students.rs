//! Handlers for `/students` endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use pickup_core::{
  directory::{self, Synced},
  store::PickupStore,
  student::{NewStudent, Student, StudentPatch},
};
use uuid::Uuid;

use crate::{AppState, JsonBody, auth::Authenticated, error::Result, report_sync};

/// `GET /students`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
) -> Result<Json<Vec<Student>>>
where
  S: PickupStore + Clone + 'static,
{
  Ok(Json(directory::list_students(&*state.store, &auth.principal).await?))
}

/// `POST /students`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  JsonBody(body): JsonBody<NewStudent>,
) -> Result<impl IntoResponse>
where
  S: PickupStore + Clone + 'static,
{
  let out = directory::create_student(&*state.store, &auth.principal, body).await?;
  report_sync("student", out.record.student_id, &out.sync);
  Ok((StatusCode::CREATED, Json(out)))
}

/// `GET /students/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Student>>
where
  S: PickupStore + Clone + 'static,
{
  Ok(Json(directory::get_student(&*state.store, &auth.principal, id).await?))
}

/// `PUT /students/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(patch): JsonBody<StudentPatch>,
) -> Result<Json<Synced<Student>>>
where
  S: PickupStore + Clone + 'static,
{
  let out = directory::update_student(&*state.store, &auth.principal, id, patch).await?;
  report_sync("student", id, &out.sync);
  Ok(Json(out))
}

/// `DELETE /students/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode>
where
  S: PickupStore + Clone + 'static,
{
  directory::delete_student(&*state.store, &auth.principal, id).await?;
  tracing::info!(student = %id, "student deleted");
  Ok(StatusCode::NO_CONTENT)
}
