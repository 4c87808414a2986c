//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that SQL string comparison orders them
//! chronologically. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use pickup_core::{
  guardian::{Guardian, Role, Session},
  pickup::{Collector, IssuedCode, PickupLogEntry},
  student::{AuthorizedPickup, Student},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_role(role: Role) -> &'static str {
  match role {
    Role::Guardian => "guardian",
    Role::Staff => "staff",
    Role::Admin => "admin",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown role: {s:?}")))
}

fn decode_uuids(raw: &[String]) -> Result<Vec<Uuid>> {
  raw.iter().map(|s| decode_uuid(s)).collect()
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A guardian row plus its `guardian_children` rows, as read from SQLite.
pub struct RawGuardian {
  pub guardian_id: String,
  pub name:        String,
  pub email:       String,
  pub phone:       Option<String>,
  pub role:        String,
  pub photo:       String,
  pub created_at:  String,
  pub children:    Vec<String>,
}

impl RawGuardian {
  pub fn into_guardian(self) -> Result<Guardian> {
    Ok(Guardian {
      guardian_id: decode_uuid(&self.guardian_id)?,
      name:        self.name,
      email:       self.email,
      phone:       self.phone,
      role:        decode_role(&self.role)?,
      photo:       self.photo,
      children:    decode_uuids(&self.children)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawSession {
  pub token_hash:  String,
  pub guardian_id: String,
  pub created_at:  String,
  pub expires_at:  String,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      token_hash:  self.token_hash,
      guardian_id: decode_uuid(&self.guardian_id)?,
      created_at:  decode_dt(&self.created_at)?,
      expires_at:  decode_dt(&self.expires_at)?,
    })
  }
}

pub struct RawAuthorizedPickup {
  pub pickup_id:       String,
  pub name:            String,
  pub relationship:    String,
  pub phone:           String,
  pub code:            Option<String>,
  pub code_expires_at: Option<String>,
}

impl RawAuthorizedPickup {
  fn into_authorized_pickup(self) -> Result<AuthorizedPickup> {
    Ok(AuthorizedPickup {
      pickup_id:       decode_uuid(&self.pickup_id)?,
      name:            self.name,
      relationship:    self.relationship,
      phone:           self.phone,
      code:            self.code,
      code_expires_at: decode_opt_dt(self.code_expires_at.as_deref())?,
    })
  }
}

pub struct RawCode {
  pub code_id:     String,
  pub code:        String,
  pub guardian_id: String,
  pub issued_at:   String,
  pub expires_at:  String,
}

impl RawCode {
  fn into_code(self) -> Result<IssuedCode> {
    Ok(IssuedCode {
      code_id:     decode_uuid(&self.code_id)?,
      code:        self.code,
      guardian_id: decode_uuid(&self.guardian_id)?,
      issued_at:   decode_dt(&self.issued_at)?,
      expires_at:  decode_dt(&self.expires_at)?,
    })
  }
}

pub struct RawLog {
  pub log_id:      String,
  pub student_id:  String,
  pub guardian_id: Option<String>,
  pub pickup_id:   Option<String>,
  pub pickup_name: Option<String>,
  pub verified_by: String,
  pub timestamp:   String,
}

impl RawLog {
  fn into_entry(self) -> Result<PickupLogEntry> {
    let collector = match (self.guardian_id, self.pickup_id) {
      (Some(g), None) => Collector::Guardian { guardian_id: decode_uuid(&g)? },
      (None, Some(p)) => Collector::AuthorizedPerson {
        pickup_id: decode_uuid(&p)?,
        name:      self.pickup_name.unwrap_or_default(),
      },
      _ => {
        return Err(Error::Decode(format!(
          "pickup log {} has no single collector",
          self.log_id
        )));
      }
    };
    Ok(PickupLogEntry {
      log_id: decode_uuid(&self.log_id)?,
      student_id: decode_uuid(&self.student_id)?,
      collector,
      verified_by: decode_uuid(&self.verified_by)?,
      timestamp: decode_dt(&self.timestamp)?,
    })
  }
}

/// Column values for a `pickup_logs` insert.
pub struct LogColumns {
  pub log_id:      String,
  pub student_id:  String,
  pub guardian_id: Option<String>,
  pub pickup_id:   Option<String>,
  pub pickup_name: Option<String>,
  pub verified_by: String,
  pub timestamp:   String,
}

pub fn encode_log(entry: &PickupLogEntry) -> LogColumns {
  let (guardian_id, pickup_id, pickup_name) = match &entry.collector {
    Collector::Guardian { guardian_id } => (Some(encode_uuid(*guardian_id)), None, None),
    Collector::AuthorizedPerson { pickup_id, name } => {
      (None, Some(encode_uuid(*pickup_id)), Some(name.clone()))
    }
  };
  LogColumns {
    log_id: encode_uuid(entry.log_id),
    student_id: encode_uuid(entry.student_id),
    guardian_id,
    pickup_id,
    pickup_name,
    verified_by: encode_uuid(entry.verified_by),
    timestamp: encode_dt(entry.timestamp),
  }
}

/// A student row plus all of its embedded lists.
pub struct RawStudent {
  pub student_id:        String,
  pub student_number:    String,
  pub first_name:        String,
  pub last_name:         String,
  pub grade:             String,
  pub date_of_birth:     String,
  pub photo:             String,
  pub is_active:         bool,
  pub created_at:        String,
  pub updated_at:        String,
  pub guardians:         Vec<String>,
  pub authorized_pickup: Vec<RawAuthorizedPickup>,
  pub codes:             Vec<RawCode>,
  pub logs:              Vec<RawLog>,
}

impl RawStudent {
  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id:        decode_uuid(&self.student_id)?,
      student_number:    self.student_number,
      first_name:        self.first_name,
      last_name:         self.last_name,
      grade:             self.grade,
      date_of_birth:     decode_date(&self.date_of_birth)?,
      photo:             self.photo,
      is_active:         self.is_active,
      guardians:         decode_uuids(&self.guardians)?,
      authorized_pickup: self
        .authorized_pickup
        .into_iter()
        .map(RawAuthorizedPickup::into_authorized_pickup)
        .collect::<Result<_>>()?,
      codes:             self
        .codes
        .into_iter()
        .map(RawCode::into_code)
        .collect::<Result<_>>()?,
      pickup_logs:       self
        .logs
        .into_iter()
        .map(RawLog::into_entry)
        .collect::<Result<_>>()?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexicographically() {
    let early = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let late = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
    assert!(encode_dt(early) < encode_dt(late));
    assert_eq!(encode_dt(early).len(), encode_dt(late).len());
  }

  #[test]
  fn timestamp_survives_encoding_at_micro_precision() {
    let dt = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
    assert_eq!(decode_dt(&encode_dt(dt)).unwrap(), dt);
  }

  #[test]
  fn roles_decode_from_stored_strings() {
    for role in [Role::Guardian, Role::Staff, Role::Admin] {
      assert_eq!(decode_role(encode_role(role)).unwrap(), role);
    }
    assert!(decode_role("parent").is_err());
  }
}
