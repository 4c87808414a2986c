//! The pickup code issuer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  guardian::Principal,
  pickup::{
    CodePayload, IssuedCode, PickupPersonPayload, encode_payload, generate_token,
    guardian_code_expiry, pickup_person_code_expiry,
  },
  policy,
  render::CodeRenderer,
  store::PickupStore,
};

/// What the caller gets back from [`issue_guardian_code`].
#[derive(Debug, Clone, Serialize)]
pub struct IssuedGuardianCode {
  pub code:       String,
  /// The rendered QR image of the JSON [`CodePayload`].
  pub image:      String,
  pub issued_at:  DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

/// What the caller gets back from [`issue_pickup_person_code`].
#[derive(Debug, Clone, Serialize)]
pub struct IssuedPickupPersonCode {
  pub code:               String,
  pub image:              String,
  pub expires_at:         DateTime<Utc>,
  pub student_id:         Uuid,
  pub pickup_id:          Uuid,
  pub student_name:       String,
  pub pickup_person_name: String,
}

/// Issue a 24-hour single-use code binding `student_id` to `guardian_id`.
///
/// The image is rendered before anything is persisted, so a rendering
/// failure leaves the student record untouched.
pub async fn issue_guardian_code<S: PickupStore>(
  store: &S,
  renderer: &dyn CodeRenderer,
  principal: &Principal,
  student_id: Uuid,
  guardian_id: Uuid,
  now: DateTime<Utc>,
) -> Result<IssuedGuardianCode> {
  let student = store
    .get_student(student_id)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| Error::NotFound(format!("student not found with id of {student_id}")))?;

  policy::issue_guardian_code(principal, &student, guardian_id)?;

  let code = generate_token();
  if student.codes.iter().any(|c| c.is_active_at(now) && c.code == code) {
    return Err(Error::Conflict("generated pickup code collides with an active code".into()));
  }

  let payload = CodePayload {
    student_id,
    guardian_id,
    code: code.clone(),
    issued_at: now,
  };
  let image = renderer
    .render(&encode_payload(&payload)?)
    .map_err(Error::Render)?;

  let issued = IssuedCode {
    code_id: Uuid::new_v4(),
    code,
    guardian_id,
    issued_at: now,
    expires_at: guardian_code_expiry(now),
  };
  let expires_at = issued.expires_at;
  let code = issued.code.clone();

  let stored = store
    .add_code(student_id, issued)
    .await
    .map_err(Into::into)?;
  if !stored {
    return Err(Error::NotFound(format!("student not found with id of {student_id}")));
  }

  Ok(IssuedGuardianCode { code, image, issued_at: now, expires_at })
}

/// Issue a one-hour code for an authorized-pickup entry, replacing any code
/// the entry already held.
pub async fn issue_pickup_person_code<S: PickupStore>(
  store: &S,
  renderer: &dyn CodeRenderer,
  principal: &Principal,
  student_id: Uuid,
  pickup_id: Uuid,
  now: DateTime<Utc>,
) -> Result<IssuedPickupPersonCode> {
  let student = store
    .get_student(student_id)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| Error::NotFound(format!("student not found with id of {student_id}")))?;

  policy::issue_pickup_person_code(principal, &student)?;

  let person = student
    .authorized_pickup(pickup_id)
    .ok_or_else(|| Error::not_found("authorized pickup person"))?;

  let code = generate_token();
  let expires_at = pickup_person_code_expiry(now);

  let payload = PickupPersonPayload {
    student_id,
    pickup_id,
    code: code.clone(),
    issued_at: now,
  };
  let image = renderer
    .render(&encode_payload(&payload)?)
    .map_err(Error::Render)?;

  let stored = store
    .set_pickup_person_code(student_id, pickup_id, code.clone(), expires_at)
    .await
    .map_err(Into::into)?;
  if !stored {
    return Err(Error::not_found("authorized pickup person"));
  }

  Ok(IssuedPickupPersonCode {
    code,
    image,
    expires_at,
    student_id,
    pickup_id,
    student_name: student.full_name(),
    pickup_person_name: person.name.clone(),
  })
}
