//! The relationship synchroniser.
//!
//! Guardian ↔ student links are stored twice: once in `Guardian::children`
//! and once in `Student::guardians`. After one side's set is replaced, the
//! functions here bring every counterpart in line:
//!
//! 1. remove the entity's id from each currently-linked counterpart that is
//!    not in the new set;
//! 2. add the entity's id to each counterpart in the new set (set union, so
//!    already-linked counterparts are unaffected).
//!
//! Consistency is best-effort. A failed counterpart update is recorded in
//! the [`SyncReport`] and does not roll back updates already applied. The
//! operation is idempotent and safe to retry wholesale.

use serde::Serialize;
use uuid::Uuid;

use crate::{Result, store::PickupStore};

/// Outcome of one synchronisation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
  /// Counterparts the entity was removed from.
  pub detached: Vec<Uuid>,
  /// Counterparts now referencing the entity.
  pub attached: Vec<Uuid>,
  pub failures: Vec<SyncFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
  pub counterpart: Uuid,
  pub reason:      String,
}

impl SyncReport {
  pub fn is_complete(&self) -> bool { self.failures.is_empty() }

  fn detach<E: std::fmt::Display>(&mut self, id: Uuid, outcome: Result<bool, E>) {
    match outcome {
      Ok(true) => self.detached.push(id),
      // Already gone: nothing references the entity any more.
      Ok(false) => {}
      Err(e) => self.failures.push(SyncFailure { counterpart: id, reason: e.to_string() }),
    }
  }

  fn attach<E: std::fmt::Display>(&mut self, id: Uuid, outcome: Result<bool, E>) {
    match outcome {
      Ok(true) => self.attached.push(id),
      Ok(false) => self.failures.push(SyncFailure {
        counterpart: id,
        reason:      "counterpart not found".into(),
      }),
      Err(e) => self.failures.push(SyncFailure { counterpart: id, reason: e.to_string() }),
    }
  }
}

/// Bring guardians' child sets in line with a student's new guardian set.
pub async fn sync_student_guardians<S: PickupStore>(
  store: &S,
  student_id: Uuid,
  guardians: &[Uuid],
) -> Result<SyncReport> {
  let linked = store
    .guardians_referencing(student_id)
    .await
    .map_err(Into::into)?;

  let mut report = SyncReport::default();

  for &guardian_id in linked.iter().filter(|g| !guardians.contains(g)) {
    let outcome = store.pull_child(guardian_id, student_id).await;
    report.detach(guardian_id, outcome);
  }

  for &guardian_id in dedup(guardians).iter() {
    let outcome = store.add_child(guardian_id, student_id).await;
    report.attach(guardian_id, outcome);
  }

  Ok(report)
}

/// Bring students' guardian sets in line with a guardian's new child set.
pub async fn sync_guardian_children<S: PickupStore>(
  store: &S,
  guardian_id: Uuid,
  children: &[Uuid],
) -> Result<SyncReport> {
  let linked = store
    .students_referencing(guardian_id)
    .await
    .map_err(Into::into)?;

  let mut report = SyncReport::default();

  for &student_id in linked.iter().filter(|s| !children.contains(s)) {
    let outcome = store.pull_guardian(student_id, guardian_id).await;
    report.detach(student_id, outcome);
  }

  for &student_id in dedup(children).iter() {
    let outcome = store.add_guardian(student_id, guardian_id).await;
    report.attach(student_id, outcome);
  }

  Ok(report)
}

/// Order-preserving de-duplication of an id list.
pub(crate) fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
  let mut out = Vec::with_capacity(ids.len());
  for id in ids {
    if !out.contains(id) {
      out.push(*id);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dedup_keeps_first_occurrence() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert_eq!(dedup(&[a, b, a, b]), vec![a, b]);
  }

  #[test]
  fn missing_counterpart_on_attach_is_a_failure() {
    let mut report = SyncReport::default();
    let id = Uuid::new_v4();
    report.attach::<String>(id, Ok(false));
    assert!(!report.is_complete());
    assert_eq!(report.failures[0].counterpart, id);
  }

  #[test]
  fn missing_counterpart_on_detach_is_ignored() {
    let mut report = SyncReport::default();
    report.detach::<String>(Uuid::new_v4(), Ok(false));
    assert!(report.is_complete());
    assert!(report.detached.is_empty());
  }

  #[test]
  fn store_errors_are_reported_not_raised() {
    let mut report = SyncReport::default();
    let id = Uuid::new_v4();
    report.detach(id, Err("disk full"));
    assert_eq!(report.failures, vec![SyncFailure {
      counterpart: id,
      reason:      "disk full".into(),
    }]);
  }
}
