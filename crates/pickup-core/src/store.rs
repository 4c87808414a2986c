//! The `PickupStore` trait.
//!
//! Implemented by storage backends (e.g. `pickup-store-sqlite`). The
//! workflows in this crate depend on this abstraction, not on any concrete
//! backend.
//!
//! Each method is a single request-level unit: a backend must apply it
//! atomically to the record(s) it targets. Methods that return `bool` report
//! whether the targeted record existed (or, for the redeem methods, whether
//! the conditional update matched).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  guardian::{Credentials, Guardian, GuardianPatch, NewGuardian, Role, Session},
  pickup::{IssuedCode, PickupLogEntry},
  student::{NewStudent, Student, StudentPatch},
};

/// Abstraction over a pickup store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait PickupStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Guardians ─────────────────────────────────────────────────────────

  /// Persist a new account. Fails with a conflict if the email is taken.
  fn create_guardian(
    &self,
    input: NewGuardian,
  ) -> impl Future<Output = Result<Guardian, Self::Error>> + Send + '_;

  fn get_guardian(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Guardian>, Self::Error>> + Send + '_;

  /// List accounts, optionally filtered by role.
  fn list_guardians(
    &self,
    role: Option<Role>,
  ) -> impl Future<Output = Result<Vec<Guardian>, Self::Error>> + Send + '_;

  /// Apply a patch. When `patch.children` is set, only this guardian's own
  /// child set is replaced; counterparts are the synchroniser's job.
  /// Returns `None` if the guardian does not exist.
  fn update_guardian(
    &self,
    id: Uuid,
    patch: GuardianPatch,
  ) -> impl Future<Output = Result<Option<Guardian>, Self::Error>> + Send + '_;

  fn delete_guardian(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_credentials(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  fn create_session(
    &self,
    session: Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_session(
    &self,
    token_hash: String,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  fn delete_session(
    &self,
    token_hash: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Students ──────────────────────────────────────────────────────────

  /// Persist a new student, including its own guardian set and allowlist.
  /// Fails with a conflict if the student number is taken.
  fn create_student(
    &self,
    input: NewStudent,
  ) -> impl Future<Output = Result<Student, Self::Error>> + Send + '_;

  /// Load the full record: guardians, allowlist, codes and pickup log.
  fn get_student(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  fn list_students(
    &self,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  /// Students whose guardian set contains `guardian_id`.
  fn list_students_for_guardian(
    &self,
    guardian_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  /// Apply a patch. When `patch.guardians` is set, only this student's own
  /// guardian set is replaced. Returns `None` if the student does not exist.
  fn update_student(
    &self,
    id: Uuid,
    patch: StudentPatch,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  fn delete_student(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Cross-references ──────────────────────────────────────────────────

  /// Guardians whose child set contains `student_id`.
  fn guardians_referencing(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Students whose guardian set contains `guardian_id`.
  fn students_referencing(
    &self,
    guardian_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Add `student_id` to a guardian's child set (set union).
  fn add_child(
    &self,
    guardian_id: Uuid,
    student_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove `student_id` from a guardian's child set.
  fn pull_child(
    &self,
    guardian_id: Uuid,
    student_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Add `guardian_id` to a student's guardian set (set union).
  fn add_guardian(
    &self,
    student_id: Uuid,
    guardian_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove `guardian_id` from a student's guardian set.
  fn pull_guardian(
    &self,
    student_id: Uuid,
    guardian_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove `student_id` from every guardian's child set. Returns the number
  /// of guardians touched.
  fn pull_child_everywhere(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Remove `guardian_id` from every student's guardian set.
  fn pull_guardian_everywhere(
    &self,
    guardian_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Codes and pickups ─────────────────────────────────────────────────

  /// Append a code to the student's code list.
  fn add_code(
    &self,
    student_id: Uuid,
    code: IssuedCode,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Compare-and-remove: delete code `code_id` from the student's list if it
  /// is still present and unexpired at `entry.timestamp`, and append `entry`
  /// to the log in the same state transition. Returns `false` (and changes
  /// nothing) if the code was already gone or expired.
  fn redeem_code(
    &self,
    student_id: Uuid,
    code_id: Uuid,
    entry: PickupLogEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Replace an allowlist entry's code/expiry pair.
  fn set_pickup_person_code(
    &self,
    student_id: Uuid,
    pickup_id: Uuid,
    code: String,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Compare-and-clear for allowlist codes: clear the entry's code if it
  /// still equals `code` and is unexpired at `entry.timestamp`, appending
  /// `entry` in the same state transition.
  fn redeem_pickup_person_code(
    &self,
    student_id: Uuid,
    pickup_id: Uuid,
    code: String,
    entry: PickupLogEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
