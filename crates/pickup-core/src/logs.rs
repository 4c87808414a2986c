//! The pickup log query.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Result,
  guardian::{Guardian, Principal},
  pickup::Collector,
  policy::{self, LogScope},
  store::PickupStore,
  verifier::UNKNOWN_VERIFIER,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogStudent {
  pub id:   Uuid,
  pub name: String,
}

/// The collector as displayed in the log. Guardian details are `None` when
/// the account has since been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogCollector {
  Guardian {
    id:    Uuid,
    name:  Option<String>,
    email: Option<String>,
  },
  AuthorizedPerson {
    id:   Uuid,
    name: String,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupLogView {
  pub student:     LogStudent,
  pub collector:   LogCollector,
  pub verified_by: String,
  pub timestamp:   DateTime<Utc>,
}

/// List pickup logs visible to `principal`, newest first.
///
/// Guardians see only their own children's pickups; staff and admins see
/// everything. A guardian with no linked students gets an empty list.
pub async fn list_pickup_logs<S: PickupStore>(
  store: &S,
  principal: &Principal,
) -> Result<Vec<PickupLogView>> {
  let students = match policy::log_scope(principal) {
    LogScope::All => store.list_students().await,
    LogScope::ChildrenOf(id) => store.list_students_for_guardian(id).await,
  }
  .map_err(Into::into)?;

  let mut accounts: HashMap<Uuid, Option<Guardian>> = HashMap::new();
  let mut views = Vec::new();

  for student in &students {
    for log in &student.pickup_logs {
      let collector = match &log.collector {
        Collector::Guardian { guardian_id } => {
          let found = account(store, &mut accounts, *guardian_id).await?;
          LogCollector::Guardian {
            id:    *guardian_id,
            name:  found.map(|g| g.name.clone()),
            email: found.map(|g| g.email.clone()),
          }
        }
        Collector::AuthorizedPerson { pickup_id, name } => {
          LogCollector::AuthorizedPerson { id: *pickup_id, name: name.clone() }
        }
      };

      let verified_by = account(store, &mut accounts, log.verified_by)
        .await?
        .map(|g| g.name.clone())
        .unwrap_or_else(|| UNKNOWN_VERIFIER.to_string());

      views.push(PickupLogView {
        student: LogStudent { id: student.student_id, name: student.full_name() },
        collector,
        verified_by,
        timestamp: log.timestamp,
      });
    }
  }

  views.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
  Ok(views)
}

/// Memoised account lookup.
async fn account<'c, S: PickupStore>(
  store: &S,
  cache: &'c mut HashMap<Uuid, Option<Guardian>>,
  id: Uuid,
) -> Result<Option<&'c Guardian>> {
  if !cache.contains_key(&id) {
    let found = store.get_guardian(id).await.map_err(Into::into)?;
    cache.insert(id, found);
  }
  Ok(cache.get(&id).and_then(Option::as_ref))
}
