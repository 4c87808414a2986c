//! Guardian and student CRUD.
//!
//! Each write that changes a linkage list persists the entity's own side
//! first and then hands the new set to the [`crate::sync`] functions.
//! Deletes detach the entity from every counterpart before removing it.

use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  guardian::{Guardian, GuardianPatch, NewGuardian, Principal, Role},
  policy,
  store::PickupStore,
  student::{NewAuthorizedPickup, NewStudent, Student, StudentPatch},
  sync::{self, SyncReport, dedup},
};

/// A written record together with the outcome of any counterpart
/// synchronisation it triggered.
#[derive(Debug, Clone, Serialize)]
pub struct Synced<T> {
  pub record: T,
  pub sync:   SyncReport,
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn required(field: &str, value: &str) -> Result<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::InvalidInput(format!("please add a {field}")));
  }
  Ok(trimmed.to_string())
}

/// Trim and lowercase an email address and check its basic shape.
pub fn normalize_email(email: &str) -> Result<String> {
  let email = email.trim().to_lowercase();
  let valid = match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
    }
    None => false,
  };
  if !valid {
    return Err(Error::InvalidInput("please add a valid email".into()));
  }
  Ok(email)
}

fn validate_pickup_entries(entries: &mut [NewAuthorizedPickup]) -> Result<()> {
  for entry in entries {
    entry.name = required("pickup person name", &entry.name)?;
    entry.relationship = required("pickup person relationship", &entry.relationship)?;
    entry.phone = required("pickup person phone", &entry.phone)?;
  }
  Ok(())
}

/// Every id must name an existing guardian-role account.
async fn validate_guardian_ids<S: PickupStore>(store: &S, ids: &[Uuid]) -> Result<Vec<Uuid>> {
  let ids = dedup(ids);
  for id in &ids {
    let found = store.get_guardian(*id).await.map_err(Into::into)?;
    if !found.is_some_and(|g| g.role == Role::Guardian) {
      return Err(Error::InvalidInput(format!("guardian {id} not found")));
    }
  }
  Ok(ids)
}

async fn validate_student_ids<S: PickupStore>(store: &S, ids: &[Uuid]) -> Result<Vec<Uuid>> {
  let ids = dedup(ids);
  for id in &ids {
    if store.get_student(*id).await.map_err(Into::into)?.is_none() {
      return Err(Error::InvalidInput(format!("student {id} not found")));
    }
  }
  Ok(ids)
}

fn student_not_found(id: Uuid) -> Error {
  Error::NotFound(format!("student not found with id of {id}"))
}

fn guardian_not_found(id: Uuid) -> Error {
  Error::NotFound(format!("guardian not found with id of {id}"))
}

// ─── Students ────────────────────────────────────────────────────────────────

pub async fn list_students<S: PickupStore>(
  store: &S,
  principal: &Principal,
) -> Result<Vec<Student>> {
  policy::manage_directory(principal)?;
  store.list_students().await.map_err(Into::into)
}

pub async fn get_student<S: PickupStore>(
  store: &S,
  principal: &Principal,
  id: Uuid,
) -> Result<Student> {
  let student = store
    .get_student(id)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| student_not_found(id))?;
  policy::view_student(principal, &student)?;
  Ok(student)
}

pub async fn create_student<S: PickupStore>(
  store: &S,
  principal: &Principal,
  mut input: NewStudent,
) -> Result<Synced<Student>> {
  policy::manage_directory(principal)?;

  input.first_name = required("first name", &input.first_name)?;
  input.last_name = required("last name", &input.last_name)?;
  input.student_number = required("student number", &input.student_number)?;
  input.grade = required("grade", &input.grade)?;
  validate_pickup_entries(&mut input.authorized_pickup)?;
  input.guardians = validate_guardian_ids(store, &input.guardians).await?;

  let student = store.create_student(input).await.map_err(Into::into)?;
  let sync =
    sync::sync_student_guardians(store, student.student_id, &student.guardians).await?;

  Ok(Synced { record: student, sync })
}

pub async fn update_student<S: PickupStore>(
  store: &S,
  principal: &Principal,
  id: Uuid,
  mut patch: StudentPatch,
) -> Result<Synced<Student>> {
  policy::manage_directory(principal)?;

  if let Some(v) = patch.first_name.take() {
    patch.first_name = Some(required("first name", &v)?);
  }
  if let Some(v) = patch.last_name.take() {
    patch.last_name = Some(required("last name", &v)?);
  }
  if let Some(v) = patch.student_number.take() {
    patch.student_number = Some(required("student number", &v)?);
  }
  if let Some(v) = patch.grade.take() {
    patch.grade = Some(required("grade", &v)?);
  }
  if let Some(entries) = patch.authorized_pickup.as_mut() {
    validate_pickup_entries(entries)?;
  }
  if let Some(ids) = patch.guardians.take() {
    patch.guardians = Some(validate_guardian_ids(store, &ids).await?);
  }

  let relink = patch.guardians.is_some();
  let student = store
    .update_student(id, patch)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| student_not_found(id))?;

  let sync = if relink {
    sync::sync_student_guardians(store, student.student_id, &student.guardians).await?
  } else {
    SyncReport::default()
  };

  Ok(Synced { record: student, sync })
}

/// Detach the student from every guardian, then remove it.
pub async fn delete_student<S: PickupStore>(
  store: &S,
  principal: &Principal,
  id: Uuid,
) -> Result<()> {
  policy::manage_directory(principal)?;

  store
    .get_student(id)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| student_not_found(id))?;

  store.pull_child_everywhere(id).await.map_err(Into::into)?;

  if !store.delete_student(id).await.map_err(Into::into)? {
    return Err(student_not_found(id));
  }
  Ok(())
}

// ─── Guardians ───────────────────────────────────────────────────────────────

/// Guardian-role accounts only; staff and admins are not listed.
pub async fn list_guardians<S: PickupStore>(
  store: &S,
  principal: &Principal,
) -> Result<Vec<Guardian>> {
  policy::manage_directory(principal)?;
  store
    .list_guardians(Some(Role::Guardian))
    .await
    .map_err(Into::into)
}

pub async fn get_guardian<S: PickupStore>(
  store: &S,
  principal: &Principal,
  id: Uuid,
) -> Result<Guardian> {
  policy::view_guardian(principal, id)?;
  store
    .get_guardian(id)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| guardian_not_found(id))
}

async fn insert_guardian<S: PickupStore>(
  store: &S,
  mut input: NewGuardian,
) -> Result<Synced<Guardian>> {
  input.name = required("name", &input.name)?;
  input.email = normalize_email(&input.email)?;
  input.children = if input.role == Role::Guardian {
    validate_student_ids(store, &input.children).await?
  } else if input.children.is_empty() {
    Vec::new()
  } else {
    return Err(Error::InvalidInput("only guardian accounts may have children".into()));
  };

  let guardian = store.create_guardian(input).await.map_err(Into::into)?;
  let sync =
    sync::sync_guardian_children(store, guardian.guardian_id, &guardian.children).await?;

  Ok(Synced { record: guardian, sync })
}

/// Admin account creation; the admin chooses the role.
pub async fn create_guardian<S: PickupStore>(
  store: &S,
  principal: &Principal,
  input: NewGuardian,
) -> Result<Synced<Guardian>> {
  policy::manage_directory(principal)?;
  insert_guardian(store, input).await
}

/// Self-service registration. Always creates a guardian-role account with no
/// linked children, whatever the caller asked for.
pub async fn register_guardian<S: PickupStore>(store: &S, mut input: NewGuardian) -> Result<Guardian> {
  input.role = Role::Guardian;
  input.children = Vec::new();
  Ok(insert_guardian(store, input).await?.record)
}

/// Bootstrap an administrator outside any request context.
pub async fn create_admin<S: PickupStore>(store: &S, mut input: NewGuardian) -> Result<Guardian> {
  input.role = Role::Admin;
  input.children = Vec::new();
  Ok(insert_guardian(store, input).await?.record)
}

pub async fn update_guardian<S: PickupStore>(
  store: &S,
  principal: &Principal,
  id: Uuid,
  mut patch: GuardianPatch,
) -> Result<Synced<Guardian>> {
  policy::update_guardian(principal, id)?;

  if !policy::guardian_patch_allows_privileged_fields(principal) {
    patch.role = None;
    patch.children = None;
  }

  if let Some(v) = patch.name.take() {
    patch.name = Some(required("name", &v)?);
  }
  if let Some(v) = patch.email.take() {
    patch.email = Some(normalize_email(&v)?);
  }
  if let Some(ids) = patch.children.take() {
    patch.children = Some(validate_student_ids(store, &ids).await?);
  }

  let current = store
    .get_guardian(id)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| guardian_not_found(id))?;
  let role = patch.role.unwrap_or(current.role);
  let children = patch.children.as_ref().unwrap_or(&current.children);
  if role != Role::Guardian && !children.is_empty() {
    return Err(Error::InvalidInput("only guardian accounts may have children".into()));
  }

  let relink = patch.children.is_some();
  let guardian = store
    .update_guardian(id, patch)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| guardian_not_found(id))?;

  let sync = if relink {
    sync::sync_guardian_children(store, guardian.guardian_id, &guardian.children).await?
  } else {
    SyncReport::default()
  };

  Ok(Synced { record: guardian, sync })
}

/// Detach the guardian from every student, then remove the account.
pub async fn delete_guardian<S: PickupStore>(
  store: &S,
  principal: &Principal,
  id: Uuid,
) -> Result<()> {
  policy::manage_directory(principal)?;

  store
    .get_guardian(id)
    .await
    .map_err(Into::into)?
    .ok_or_else(|| guardian_not_found(id))?;

  store.pull_guardian_everywhere(id).await.map_err(Into::into)?;

  if !store.delete_guardian(id).await.map_err(Into::into)? {
    return Err(guardian_not_found(id));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn email_is_normalised() {
    assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
  }

  #[test]
  fn malformed_emails_are_rejected() {
    for bad in ["", "ada", "@example.com", "ada@example", "ada@.com", "a@b@c.com"] {
      assert!(
        matches!(normalize_email(bad), Err(Error::InvalidInput(_))),
        "accepted {bad:?}"
      );
    }
  }

  #[test]
  fn required_fields_are_trimmed() {
    assert_eq!(required("name", "  Ada ").unwrap(), "Ada");
    assert!(required("name", "   ").is_err());
  }
}
