//! Student records and their embedded lists.
//!
//! A student owns its authorized-pickup allowlist, its outstanding pickup
//! codes, and its pickup history. The guardian set is a shared reference
//! kept in sync with `Guardian::children`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pickup::{IssuedCode, PickupLogEntry};

// ─── Authorized pickup ───────────────────────────────────────────────────────

/// A named non-guardian allowed to collect the student, e.g. a grandparent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedPickup {
  pub pickup_id:       Uuid,
  pub name:            String,
  pub relationship:    String,
  pub phone:           String,
  #[serde(skip_serializing, default)]
  pub code:            Option<String>,
  pub code_expires_at: Option<DateTime<Utc>>,
}

impl AuthorizedPickup {
  /// The entry's code is usable only while set and unexpired.
  pub fn code_matches_at(&self, code: &str, now: DateTime<Utc>) -> bool {
    match (&self.code, self.code_expires_at) {
      (Some(current), Some(expires)) => current == code && now < expires,
      _ => false,
    }
  }
}

/// Input for a new allowlist entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAuthorizedPickup {
  pub name:         String,
  pub relationship: String,
  pub phone:        String,
}

// ─── Student ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id:        Uuid,
  /// School-assigned identifier; unique across the directory.
  pub student_number:    String,
  pub first_name:        String,
  pub last_name:         String,
  pub grade:             String,
  pub date_of_birth:     NaiveDate,
  pub photo:             String,
  pub is_active:         bool,
  /// Ids of linked guardians; mirrors `Guardian::children`.
  pub guardians:         Vec<Uuid>,
  pub authorized_pickup: Vec<AuthorizedPickup>,
  /// Outstanding codes. Never serialised: they are bearer secrets.
  #[serde(skip_serializing, default)]
  pub codes:             Vec<IssuedCode>,
  pub pickup_logs:       Vec<PickupLogEntry>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

impl Student {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }

  pub fn has_guardian(&self, guardian_id: Uuid) -> bool {
    self.guardians.contains(&guardian_id)
  }

  pub fn authorized_pickup(&self, pickup_id: Uuid) -> Option<&AuthorizedPickup> {
    self.authorized_pickup.iter().find(|p| p.pickup_id == pickup_id)
  }
}

/// Input to [`crate::store::PickupStore::create_student`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
  pub student_number:    String,
  pub first_name:        String,
  pub last_name:         String,
  pub grade:             String,
  pub date_of_birth:     NaiveDate,
  pub photo:             Option<String>,
  #[serde(default)]
  pub guardians:         Vec<Uuid>,
  #[serde(default)]
  pub authorized_pickup: Vec<NewAuthorizedPickup>,
}

/// A partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentPatch {
  pub student_number:    Option<String>,
  pub first_name:        Option<String>,
  pub last_name:         Option<String>,
  pub grade:             Option<String>,
  pub date_of_birth:     Option<NaiveDate>,
  pub photo:             Option<String>,
  pub is_active:         Option<bool>,
  /// Replaces the guardian set wholesale; counterparts are re-synchronised.
  pub guardians:         Option<Vec<Uuid>>,
  /// Replaces the allowlist wholesale, discarding any outstanding codes.
  pub authorized_pickup: Option<Vec<NewAuthorizedPickup>>,
}
