//! The pickup verifier.
//!
//! Verification never partially succeeds: either the matched code is
//! removed and the log entry appended in one store transition, or nothing
//! changes and the caller gets [`Error::InvalidOrExpired`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  guardian::{Principal, Role},
  pickup::{Collector, GuardianCodeClaim, PickupLogEntry, PickupPersonClaim, find_valid_code},
  policy,
  store::PickupStore,
  student::Student,
};

/// Name reported for a verifier whose account no longer exists.
pub const UNKNOWN_VERIFIER: &str = "System";

// ─── Snapshots ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentSnapshot {
  pub id:    Uuid,
  pub name:  String,
  pub grade: String,
  pub photo: String,
}

impl From<&Student> for StudentSnapshot {
  fn from(s: &Student) -> Self {
    Self {
      id:    s.student_id,
      name:  s.full_name(),
      grade: s.grade.clone(),
      photo: s.photo.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardianSnapshot {
  pub id:    Uuid,
  pub name:  String,
  pub photo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupPersonSnapshot {
  pub id:           Uuid,
  pub name:         String,
  pub relationship: String,
}

/// Display-safe result of a verified guardian pickup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupReceipt {
  pub student:     StudentSnapshot,
  pub guardian:    GuardianSnapshot,
  pub verified_by: String,
  pub timestamp:   DateTime<Utc>,
}

/// Display-safe result of a verified authorized-person pickup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupPersonReceipt {
  pub student:       StudentSnapshot,
  pub pickup_person: PickupPersonSnapshot,
  pub verified_by:   String,
  pub timestamp:     DateTime<Utc>,
}

// ─── Guardian codes ──────────────────────────────────────────────────────────

/// Verify a scanned guardian payload and record the pickup.
pub async fn verify_guardian_pickup<S: PickupStore>(
  store: &S,
  principal: &Principal,
  raw_payload: &str,
  now: DateTime<Utc>,
) -> Result<PickupReceipt> {
  policy::verify_pickup(principal)?;
  let claim = GuardianCodeClaim::parse(raw_payload)?;

  let student = load_student(store, claim.student_id).await?;

  let guardian = store
    .get_guardian(claim.guardian_id)
    .await
    .map_err(Into::into)?
    .filter(|g| g.role == Role::Guardian)
    .ok_or_else(|| Error::not_found("guardian"))?;

  // Codes outlive the link that authorised them.
  if !student.has_guardian(guardian.guardian_id) {
    return Err(Error::InvalidOrExpired);
  }

  let matched = find_valid_code(&student.codes, guardian.guardian_id, &claim.code, now)?;
  let verified_by = verifier_name(store, principal.id).await?;

  let entry = PickupLogEntry {
    log_id:      Uuid::new_v4(),
    student_id:  student.student_id,
    collector:   Collector::Guardian { guardian_id: guardian.guardian_id },
    verified_by: principal.id,
    timestamp:   now,
  };

  // A concurrent verification may have consumed the code since we read it.
  let redeemed = store
    .redeem_code(student.student_id, matched.code_id, entry)
    .await
    .map_err(Into::into)?;
  if !redeemed {
    return Err(Error::InvalidOrExpired);
  }

  Ok(PickupReceipt {
    student:     StudentSnapshot::from(&student),
    guardian:    GuardianSnapshot {
      id:    guardian.guardian_id,
      name:  guardian.name,
      photo: guardian.photo,
    },
    verified_by,
    timestamp:   now,
  })
}

// ─── Authorized-pickup codes ─────────────────────────────────────────────────

/// Verify a scanned authorized-pickup payload and record the pickup.
pub async fn verify_pickup_person<S: PickupStore>(
  store: &S,
  principal: &Principal,
  raw_payload: &str,
  now: DateTime<Utc>,
) -> Result<PickupPersonReceipt> {
  policy::verify_pickup(principal)?;
  let claim = PickupPersonClaim::parse(raw_payload)?;

  let student = load_student(store, claim.student_id).await?;
  let person = student
    .authorized_pickup(claim.pickup_id)
    .ok_or_else(|| Error::not_found("authorized pickup person"))?;

  if !person.code_matches_at(&claim.code, now) {
    return Err(Error::InvalidOrExpired);
  }
  let verified_by = verifier_name(store, principal.id).await?;

  let entry = PickupLogEntry {
    log_id:      Uuid::new_v4(),
    student_id:  student.student_id,
    collector:   Collector::AuthorizedPerson {
      pickup_id: person.pickup_id,
      name:      person.name.clone(),
    },
    verified_by: principal.id,
    timestamp:   now,
  };

  let redeemed = store
    .redeem_pickup_person_code(student.student_id, person.pickup_id, claim.code, entry)
    .await
    .map_err(Into::into)?;
  if !redeemed {
    return Err(Error::InvalidOrExpired);
  }

  Ok(PickupPersonReceipt {
    student:       StudentSnapshot::from(&student),
    pickup_person: PickupPersonSnapshot {
      id:           person.pickup_id,
      name:         person.name.clone(),
      relationship: person.relationship.clone(),
    },
    verified_by,
    timestamp:     now,
  })
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn load_student<S: PickupStore>(store: &S, id: Uuid) -> Result<Student> {
  store
    .get_student(id)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| Error::not_found("student"))
}

pub(crate) async fn verifier_name<S: PickupStore>(store: &S, id: Uuid) -> Result<String> {
  Ok(
    store
      .get_guardian(id)
      .await
      .map_err(Into::into)?
      .map(|g| g.name)
      .unwrap_or_else(|| UNKNOWN_VERIFIER.to_string()),
  )
}
