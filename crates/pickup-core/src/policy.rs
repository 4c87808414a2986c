//! The authorization matrix, one check per operation.
//!
//! Every workflow calls exactly one of these before touching the store's
//! write paths, so the matrix can be tested without a backend.

use uuid::Uuid;

use crate::{Error, Result, guardian::Principal, student::Student};

fn forbidden(msg: &str) -> Error { Error::Forbidden(msg.to_string()) }

/// Listing, creating, updating and deleting students; listing, creating and
/// deleting guardian accounts.
pub fn manage_directory(principal: &Principal) -> Result<()> {
  if principal.role.is_admin() {
    Ok(())
  } else {
    Err(forbidden("only administrators may manage the directory"))
  }
}

/// A guardian may read their own account; admins may read any.
pub fn view_guardian(principal: &Principal, guardian_id: Uuid) -> Result<()> {
  if principal.role.is_admin() || principal.id == guardian_id {
    Ok(())
  } else {
    Err(forbidden("not authorized to access this guardian's information"))
  }
}

/// Same rule as [`view_guardian`]; field whitelisting happens separately
/// in [`guardian_patch_allows_privileged_fields`].
pub fn update_guardian(principal: &Principal, guardian_id: Uuid) -> Result<()> {
  if principal.role.is_admin() || principal.id == guardian_id {
    Ok(())
  } else {
    Err(forbidden("not authorized to update this guardian's information"))
  }
}

/// Whether `role` and `children` in a guardian patch are honoured.
pub fn guardian_patch_allows_privileged_fields(principal: &Principal) -> bool {
  principal.role.is_admin()
}

/// A student is visible to its linked guardians and to admins.
pub fn view_student(principal: &Principal, student: &Student) -> Result<()> {
  if principal.role.is_admin() || student.has_guardian(principal.id) {
    Ok(())
  } else {
    Err(forbidden("not authorized to access this student"))
  }
}

/// A guardian code names a guardian linked to the student. Guardians may
/// only request codes naming themselves; admins may request one for any
/// linked guardian.
pub fn issue_guardian_code(
  principal: &Principal,
  student: &Student,
  guardian_id: Uuid,
) -> Result<()> {
  let requester_ok = principal.role.is_admin() || principal.id == guardian_id;
  if requester_ok && student.has_guardian(guardian_id) {
    Ok(())
  } else {
    Err(forbidden("not authorized to generate a QR code for this student"))
  }
}

/// Authorized-pickup codes are issued by a linked guardian or an admin.
pub fn issue_pickup_person_code(principal: &Principal, student: &Student) -> Result<()> {
  if principal.role.is_admin() || student.has_guardian(principal.id) {
    Ok(())
  } else {
    Err(forbidden("not authorized to generate a QR code for this student"))
  }
}

pub fn verify_pickup(principal: &Principal) -> Result<()> {
  if principal.role.is_staff_or_admin() {
    Ok(())
  } else {
    Err(forbidden("only staff may verify pickups"))
  }
}

/// Which students' logs a principal may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogScope {
  All,
  ChildrenOf(Uuid),
}

pub fn log_scope(principal: &Principal) -> LogScope {
  if principal.role.is_staff_or_admin() {
    LogScope::All
  } else {
    LogScope::ChildrenOf(principal.id)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, Utc};

  use super::*;
  use crate::guardian::Role;

  fn principal(role: Role) -> Principal { Principal { id: Uuid::new_v4(), role } }

  fn student_with(guardians: Vec<Uuid>) -> Student {
    Student {
      student_id: Uuid::new_v4(),
      student_number: "S-1".into(),
      first_name: "Ada".into(),
      last_name: "Byron".into(),
      grade: "3".into(),
      date_of_birth: NaiveDate::from_ymd_opt(2016, 12, 10).unwrap(),
      photo: "no-photo.jpg".into(),
      is_active: true,
      guardians,
      authorized_pickup: vec![],
      codes: vec![],
      pickup_logs: vec![],
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn only_admin_manages_directory() {
    assert!(manage_directory(&principal(Role::Admin)).is_ok());
    assert!(matches!(
      manage_directory(&principal(Role::Staff)),
      Err(Error::Forbidden(_))
    ));
    assert!(manage_directory(&principal(Role::Guardian)).is_err());
  }

  #[test]
  fn guardians_see_only_themselves() {
    let me = principal(Role::Guardian);
    assert!(view_guardian(&me, me.id).is_ok());
    assert!(view_guardian(&me, Uuid::new_v4()).is_err());
    assert!(update_guardian(&me, Uuid::new_v4()).is_err());
    assert!(view_guardian(&principal(Role::Admin), me.id).is_ok());
  }

  #[test]
  fn only_admin_changes_privileged_fields() {
    assert!(guardian_patch_allows_privileged_fields(&principal(Role::Admin)));
    assert!(!guardian_patch_allows_privileged_fields(&principal(Role::Staff)));
    assert!(!guardian_patch_allows_privileged_fields(&principal(Role::Guardian)));
  }

  #[test]
  fn linked_guardian_views_student() {
    let me = principal(Role::Guardian);
    assert!(view_student(&me, &student_with(vec![me.id])).is_ok());
    assert!(view_student(&me, &student_with(vec![Uuid::new_v4()])).is_err());
    assert!(view_student(&principal(Role::Staff), &student_with(vec![])).is_err());
  }

  #[test]
  fn guardian_codes_name_a_linked_guardian() {
    let me = principal(Role::Guardian);
    let student = student_with(vec![me.id]);
    let admin = principal(Role::Admin);

    assert!(issue_guardian_code(&me, &student, me.id).is_ok());
    assert!(issue_guardian_code(&admin, &student, me.id).is_ok());
    assert!(matches!(
      issue_guardian_code(&admin, &student, Uuid::new_v4()),
      Err(Error::Forbidden(_))
    ));
  }

  #[test]
  fn guardians_cannot_issue_codes_for_someone_else() {
    let linked = Uuid::new_v4();
    let student = student_with(vec![linked]);

    assert!(matches!(
      issue_guardian_code(&principal(Role::Guardian), &student, linked),
      Err(Error::Forbidden(_))
    ));
    assert!(issue_guardian_code(&principal(Role::Staff), &student, linked).is_err());
  }

  #[test]
  fn pickup_person_codes_need_linked_requester() {
    let me = principal(Role::Guardian);
    assert!(issue_pickup_person_code(&me, &student_with(vec![me.id])).is_ok());
    assert!(issue_pickup_person_code(&me, &student_with(vec![])).is_err());
  }

  #[test]
  fn staff_and_admin_verify() {
    assert!(verify_pickup(&principal(Role::Staff)).is_ok());
    assert!(verify_pickup(&principal(Role::Admin)).is_ok());
    assert!(verify_pickup(&principal(Role::Guardian)).is_err());
  }

  #[test]
  fn log_scope_by_role() {
    let me = principal(Role::Guardian);
    assert_eq!(log_scope(&me), LogScope::ChildrenOf(me.id));
    assert_eq!(log_scope(&principal(Role::Staff)), LogScope::All);
  }
}
