//! Guardian accounts: the people who log in.
//!
//! Staff and administrators are guardian accounts with an elevated
//! [`Role`]. Only accounts with [`Role::Guardian`] may be linked to students
//! or named in a pickup code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Roles ───────────────────────────────────────────────────────────────────

/// The role tag carried by every account.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  #[default]
  Guardian,
  Staff,
  Admin,
}

impl Role {
  pub fn is_admin(self) -> bool { matches!(self, Self::Admin) }

  /// Staff and admins may verify pickups and read every log.
  pub fn is_staff_or_admin(self) -> bool {
    matches!(self, Self::Staff | Self::Admin)
  }
}

/// The authenticated caller of an operation. Supplied by the auth layer and
/// trusted unconditionally by the workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
  pub id:   Uuid,
  pub role: Role,
}

// ─── Guardian ────────────────────────────────────────────────────────────────

/// Default photo path for accounts and students that never uploaded one.
pub const DEFAULT_PHOTO: &str = "no-photo.jpg";

/// A guardian account as seen by callers. The password hash never leaves the
/// store except through [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardian {
  pub guardian_id: Uuid,
  pub name:        String,
  pub email:       String,
  pub phone:       Option<String>,
  pub role:        Role,
  pub photo:       String,
  /// Ids of linked students; mirrors `Student::guardians`.
  pub children:    Vec<Uuid>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::PickupStore::create_guardian`].
#[derive(Debug, Clone)]
pub struct NewGuardian {
  pub name:          String,
  pub email:         String,
  pub phone:         Option<String>,
  pub role:          Role,
  pub photo:         Option<String>,
  /// Argon2 PHC string; hashing is the auth layer's job.
  pub password_hash: String,
  pub children:      Vec<Uuid>,
}

/// A partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuardianPatch {
  pub name:     Option<String>,
  pub email:    Option<String>,
  pub phone:    Option<String>,
  pub photo:    Option<String>,
  pub role:     Option<Role>,
  /// Replaces the child set wholesale; counterparts are re-synchronised.
  pub children: Option<Vec<Uuid>>,
}

/// What the login flow needs to check a password.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub guardian_id:   Uuid,
  pub password_hash: String,
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// A bearer session. Only the SHA-256 digest of the token is stored.
#[derive(Debug, Clone)]
pub struct Session {
  pub token_hash:  String,
  pub guardian_id: Uuid,
  pub created_at:  DateTime<Utc>,
  pub expires_at:  DateTime<Utc>,
}

impl Session {
  pub fn is_live_at(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }
}
