//! Pickup codes, QR payloads, and the audit log.
//!
//! A code is valid only while it is still present in its owner's list and
//! the current time is strictly before its expiry. Redemption removes it, so
//! a replayed payload always fails the validity check.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Lifetime of a guardian pickup code.
pub const GUARDIAN_CODE_TTL_HOURS: i64 = 24;

/// Lifetime of an authorized-pickup-person code.
pub const PICKUP_PERSON_CODE_TTL_HOURS: i64 = 1;

pub fn guardian_code_expiry(issued_at: DateTime<Utc>) -> DateTime<Utc> {
  issued_at + Duration::hours(GUARDIAN_CODE_TTL_HOURS)
}

pub fn pickup_person_code_expiry(issued_at: DateTime<Utc>) -> DateTime<Utc> {
  issued_at + Duration::hours(PICKUP_PERSON_CODE_TTL_HOURS)
}

/// A fresh opaque token: 122 bits from the OS random source, rendered as 32
/// lowercase hex characters.
pub fn generate_token() -> String { Uuid::new_v4().simple().to_string() }

// ─── Issued codes ────────────────────────────────────────────────────────────

/// A single-use code binding one student to one guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCode {
  pub code_id:     Uuid,
  pub code:        String,
  pub guardian_id: Uuid,
  pub issued_at:   DateTime<Utc>,
  pub expires_at:  DateTime<Utc>,
}

impl IssuedCode {
  pub fn is_active_at(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }
}

/// Find the one code matching `code` and `guardian_id` that is still active
/// at `now`.
///
/// Zero matches and more than one match are both rejected with
/// [`Error::InvalidOrExpired`].
pub fn find_valid_code<'a>(
  codes: &'a [IssuedCode],
  guardian_id: Uuid,
  code: &str,
  now: DateTime<Utc>,
) -> Result<&'a IssuedCode> {
  let mut matches = codes.iter().filter(|c| {
    c.code == code && c.guardian_id == guardian_id && c.is_active_at(now)
  });

  match (matches.next(), matches.next()) {
    (Some(found), None) => Ok(found),
    _ => Err(Error::InvalidOrExpired),
  }
}

// ─── QR payloads ─────────────────────────────────────────────────────────────

/// The JSON document encoded into a guardian pickup QR image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePayload {
  pub student_id:  Uuid,
  pub guardian_id: Uuid,
  pub code:        String,
  pub issued_at:   DateTime<Utc>,
}

/// The JSON document encoded into an authorized-pickup QR image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupPersonPayload {
  pub student_id: Uuid,
  pub pickup_id:  Uuid,
  pub code:       String,
  pub issued_at:  DateTime<Utc>,
}

/// The parts of a scanned guardian payload a verifier checks. `issued_at` is
/// informational and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuardianCodeClaim {
  pub student_id:  Uuid,
  pub guardian_id: Uuid,
  pub code:        String,
}

/// The parts of a scanned authorized-pickup payload a verifier checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PickupPersonClaim {
  pub student_id: Uuid,
  pub pickup_id:  Uuid,
  pub code:       String,
}

fn require_payload(raw: &str) -> Result<&str> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Err(Error::InvalidInput("please provide QR code data".into()));
  }
  Ok(raw)
}

fn require_code(code: &str) -> Result<()> {
  if code.is_empty() {
    return Err(Error::InvalidInput("QR code data has an empty code".into()));
  }
  Ok(())
}

fn invalid_payload(_: serde_json::Error) -> Error {
  Error::InvalidInput("invalid QR code data".into())
}

impl GuardianCodeClaim {
  pub fn parse(raw: &str) -> Result<Self> {
    let claim: Self =
      serde_json::from_str(require_payload(raw)?).map_err(invalid_payload)?;
    require_code(&claim.code)?;
    Ok(claim)
  }
}

impl PickupPersonClaim {
  pub fn parse(raw: &str) -> Result<Self> {
    let claim: Self =
      serde_json::from_str(require_payload(raw)?).map_err(invalid_payload)?;
    require_code(&claim.code)?;
    Ok(claim)
  }
}

pub(crate) fn encode_payload<T: Serialize>(payload: &T) -> Result<String> {
  serde_json::to_string(payload).map_err(|e| Error::Render(e.to_string()))
}

// ─── Audit log ───────────────────────────────────────────────────────────────

/// Who physically collected the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Collector {
  Guardian { guardian_id: Uuid },
  AuthorizedPerson {
    pickup_id: Uuid,
    /// Captured at pickup time; the allowlist entry may later be removed.
    name:      String,
  },
}

/// An immutable record of a verified pickup. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupLogEntry {
  pub log_id:      Uuid,
  pub student_id:  Uuid,
  pub collector:   Collector,
  pub verified_by: Uuid,
  pub timestamp:   DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn code(guardian_id: Uuid, token: &str, issued: i64) -> IssuedCode {
    IssuedCode {
      code_id: Uuid::new_v4(),
      code: token.into(),
      guardian_id,
      issued_at: at(issued),
      expires_at: guardian_code_expiry(at(issued)),
    }
  }

  #[test]
  fn guardian_codes_last_a_day() {
    let issued = at(1_000);
    assert_eq!(guardian_code_expiry(issued) - issued, Duration::hours(24));
    assert_eq!(pickup_person_code_expiry(issued) - issued, Duration::hours(1));
  }

  #[test]
  fn matching_code_is_found() {
    let g = Uuid::new_v4();
    let codes = vec![code(g, "abc", 0), code(g, "def", 0)];
    let found = find_valid_code(&codes, g, "def", at(60)).unwrap();
    assert_eq!(found.code, "def");
  }

  #[test]
  fn wrong_guardian_is_rejected() {
    let codes = vec![code(Uuid::new_v4(), "abc", 0)];
    let err = find_valid_code(&codes, Uuid::new_v4(), "abc", at(60)).unwrap_err();
    assert!(matches!(err, Error::InvalidOrExpired));
  }

  #[test]
  fn expiry_is_exclusive() {
    let g = Uuid::new_v4();
    let codes = vec![code(g, "abc", 0)];
    let expiry = codes[0].expires_at;
    assert!(find_valid_code(&codes, g, "abc", expiry - Duration::seconds(1)).is_ok());
    assert!(matches!(
      find_valid_code(&codes, g, "abc", expiry),
      Err(Error::InvalidOrExpired)
    ));
  }

  #[test]
  fn ambiguous_match_is_rejected() {
    let g = Uuid::new_v4();
    let codes = vec![code(g, "abc", 0), code(g, "abc", 10)];
    assert!(matches!(
      find_valid_code(&codes, g, "abc", at(60)),
      Err(Error::InvalidOrExpired)
    ));
  }

  #[test]
  fn tokens_are_distinct_hex() {
    let a = generate_token();
    let b = generate_token();
    assert_ne!(a, b);
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn payload_parses_from_issued_json() {
    let payload = CodePayload {
      student_id:  Uuid::new_v4(),
      guardian_id: Uuid::new_v4(),
      code:        "abc".into(),
      issued_at:   at(0),
    };
    let raw = encode_payload(&payload).unwrap();
    let claim = GuardianCodeClaim::parse(&raw).unwrap();
    assert_eq!(claim.student_id, payload.student_id);
    assert_eq!(claim.guardian_id, payload.guardian_id);
    assert_eq!(claim.code, "abc");
  }

  #[test]
  fn empty_payload_is_invalid_input() {
    assert!(matches!(GuardianCodeClaim::parse("  "), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn garbage_payload_is_invalid_input() {
    assert!(matches!(
      GuardianCodeClaim::parse("not json"),
      Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
      PickupPersonClaim::parse(r#"{"student_id":"x"}"#),
      Err(Error::InvalidInput(_))
    ));
  }
}
