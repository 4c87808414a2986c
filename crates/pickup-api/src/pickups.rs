//! Code issuance, pickup verification and the pickup log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/students/{id}/guardians/{guardian_id}/qrcode` | 24-hour code |
//! | `GET`  | `/students/{id}/authorized-pickup/{pickup_id}/qrcode` | 1-hour code |
//! | `POST` | `/verify-pickup` | Staff/admin; `{"qr_code_data": "..."}` |
//! | `POST` | `/verify-authorized-pickup` | Staff/admin; same body |
//! | `GET`  | `/logs` | Scoped by role |

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::Utc;
use pickup_core::{
  issuer::{self, IssuedGuardianCode, IssuedPickupPersonCode},
  logs::{self, PickupLogView},
  store::PickupStore,
  verifier::{self, PickupPersonReceipt, PickupReceipt},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, JsonBody, auth::Authenticated, error::Result};

// ─── Issue ───────────────────────────────────────────────────────────────────

/// `GET /students/{id}/guardians/{guardian_id}/qrcode`
pub async fn guardian_code<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path((student_id, guardian_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<IssuedGuardianCode>>
where
  S: PickupStore + Clone + 'static,
{
  let issued = issuer::issue_guardian_code(
    &*state.store,
    &*state.renderer,
    &auth.principal,
    student_id,
    guardian_id,
    Utc::now(),
  )
  .await?;

  tracing::info!(
    student = %student_id,
    guardian = %guardian_id,
    expires_at = %issued.expires_at,
    "guardian pickup code issued"
  );
  Ok(Json(issued))
}

/// `GET /students/{id}/authorized-pickup/{pickup_id}/qrcode`
pub async fn pickup_person_code<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path((student_id, pickup_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<IssuedPickupPersonCode>>
where
  S: PickupStore + Clone + 'static,
{
  let issued = issuer::issue_pickup_person_code(
    &*state.store,
    &*state.renderer,
    &auth.principal,
    student_id,
    pickup_id,
    Utc::now(),
  )
  .await?;

  tracing::info!(
    student = %student_id,
    pickup = %pickup_id,
    expires_at = %issued.expires_at,
    "authorized pickup code issued"
  );
  Ok(Json(issued))
}

// ─── Verify ──────────────────────────────────────────────────────────────────

/// The scanned QR content, passed through verbatim.
#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  #[serde(default)]
  pub qr_code_data: String,
}

/// `POST /verify-pickup`
pub async fn verify<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  JsonBody(body): JsonBody<VerifyBody>,
) -> Result<Json<PickupReceipt>>
where
  S: PickupStore + Clone + 'static,
{
  let receipt = verifier::verify_guardian_pickup(
    &*state.store,
    &auth.principal,
    &body.qr_code_data,
    Utc::now(),
  )
  .await?;

  tracing::info!(
    student = %receipt.student.id,
    guardian = %receipt.guardian.id,
    verified_by = %auth.principal.id,
    "pickup verified"
  );
  Ok(Json(receipt))
}

/// `POST /verify-authorized-pickup`
pub async fn verify_pickup_person<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  JsonBody(body): JsonBody<VerifyBody>,
) -> Result<Json<PickupPersonReceipt>>
where
  S: PickupStore + Clone + 'static,
{
  let receipt = verifier::verify_pickup_person(
    &*state.store,
    &auth.principal,
    &body.qr_code_data,
    Utc::now(),
  )
  .await?;

  tracing::info!(
    student = %receipt.student.id,
    pickup = %receipt.pickup_person.id,
    verified_by = %auth.principal.id,
    "authorized pickup verified"
  );
  Ok(Json(receipt))
}

// ─── Logs ────────────────────────────────────────────────────────────────────

/// `GET /logs`
pub async fn list_logs<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
) -> Result<Json<Vec<PickupLogView>>>
where
  S: PickupStore + Clone + 'static,
{
  Ok(Json(logs::list_pickup_logs(&*state.store, &auth.principal).await?))
}
