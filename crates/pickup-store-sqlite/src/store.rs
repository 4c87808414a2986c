//! [`SqliteStore`], the SQLite implementation of [`PickupStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use pickup_core::{
  guardian::{Credentials, DEFAULT_PHOTO, Guardian, GuardianPatch, NewGuardian, Role, Session},
  pickup::{IssuedCode, PickupLogEntry},
  store::PickupStore,
  student::{NewAuthorizedPickup, NewStudent, Student, StudentPatch},
};

use crate::{
  Error, Result,
  encode::{
    RawAuthorizedPickup, RawCode, RawGuardian, RawLog, RawSession, RawStudent, decode_uuid,
    encode_date, encode_dt, encode_log, encode_role, encode_uuid,
  },
  schema::SCHEMA,
};

const DUPLICATE_EMAIL: &str = "an account with this email already exists";
const DUPLICATE_STUDENT_NUMBER: &str = "a student with this student number already exists";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A pickup store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-row `bool`-returning write against one id pair.
  async fn link(&self, sql: &'static str, guard: &'static str, a: Uuid, b: Uuid) -> Result<bool> {
    let a_str = encode_uuid(a);
    let b_str = encode_uuid(b);

    let exists = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, guard, &a_str)? {
          return Ok(false);
        }
        tx.execute(sql, rusqlite::params![a_str, b_str])?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(exists)
  }
}

/// Outcome of a conditional write performed inside a connection closure.
enum Write<T> {
  Applied(T),
  Missing,
  Duplicate(&'static str),
}

impl<T> Write<T> {
  fn into_result(self) -> Result<Option<T>> {
    match self {
      Write::Applied(v) => Ok(Some(v)),
      Write::Missing => Ok(None),
      Write::Duplicate(msg) => Err(Error::Conflict(msg.to_string())),
    }
  }
}

// ─── Row loaders ─────────────────────────────────────────────────────────────
//
// These run on the connection thread and only touch rusqlite types; decoding
// into domain types happens back on the async side.

fn row_exists(conn: &rusqlite::Connection, sql: &str, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(sql, rusqlite::params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn id_list(conn: &rusqlite::Connection, sql: &str, id: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(sql)?;
  let ids = stmt
    .query_map(rusqlite::params![id], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(ids)
}

fn load_guardian(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawGuardian>> {
  let raw = conn
    .query_row(
      "SELECT guardian_id, name, email, phone, role, photo, created_at
       FROM guardians WHERE guardian_id = ?1",
      rusqlite::params![id],
      |row| {
        Ok(RawGuardian {
          guardian_id: row.get(0)?,
          name:        row.get(1)?,
          email:       row.get(2)?,
          phone:       row.get(3)?,
          role:        row.get(4)?,
          photo:       row.get(5)?,
          created_at:  row.get(6)?,
          children:    Vec::new(),
        })
      },
    )
    .optional()?;

  let Some(mut raw) = raw else { return Ok(None) };
  raw.children = id_list(
    conn,
    "SELECT student_id FROM guardian_children WHERE guardian_id = ?1 ORDER BY rowid",
    id,
  )?;
  Ok(Some(raw))
}

fn load_student(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawStudent>> {
  let raw = conn
    .query_row(
      "SELECT student_id, student_number, first_name, last_name, grade,
              date_of_birth, photo, is_active, created_at, updated_at
       FROM students WHERE student_id = ?1",
      rusqlite::params![id],
      |row| {
        Ok(RawStudent {
          student_id:        row.get(0)?,
          student_number:    row.get(1)?,
          first_name:        row.get(2)?,
          last_name:         row.get(3)?,
          grade:             row.get(4)?,
          date_of_birth:     row.get(5)?,
          photo:             row.get(6)?,
          is_active:         row.get(7)?,
          created_at:        row.get(8)?,
          updated_at:        row.get(9)?,
          guardians:         Vec::new(),
          authorized_pickup: Vec::new(),
          codes:             Vec::new(),
          logs:              Vec::new(),
        })
      },
    )
    .optional()?;

  let Some(mut raw) = raw else { return Ok(None) };

  raw.guardians = id_list(
    conn,
    "SELECT guardian_id FROM student_guardians WHERE student_id = ?1 ORDER BY rowid",
    id,
  )?;

  let mut stmt = conn.prepare(
    "SELECT pickup_id, name, relationship, phone, code, code_expires_at
     FROM authorized_pickups WHERE student_id = ?1 ORDER BY rowid",
  )?;
  raw.authorized_pickup = stmt
    .query_map(rusqlite::params![id], |row| {
      Ok(RawAuthorizedPickup {
        pickup_id:       row.get(0)?,
        name:            row.get(1)?,
        relationship:    row.get(2)?,
        phone:           row.get(3)?,
        code:            row.get(4)?,
        code_expires_at: row.get(5)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(
    "SELECT code_id, code, guardian_id, issued_at, expires_at
     FROM issued_codes WHERE student_id = ?1 ORDER BY rowid",
  )?;
  raw.codes = stmt
    .query_map(rusqlite::params![id], |row| {
      Ok(RawCode {
        code_id:     row.get(0)?,
        code:        row.get(1)?,
        guardian_id: row.get(2)?,
        issued_at:   row.get(3)?,
        expires_at:  row.get(4)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(
    "SELECT log_id, student_id, guardian_id, pickup_id, pickup_name, verified_by, timestamp
     FROM pickup_logs WHERE student_id = ?1 ORDER BY rowid",
  )?;
  raw.logs = stmt
    .query_map(rusqlite::params![id], |row| {
      Ok(RawLog {
        log_id:      row.get(0)?,
        student_id:  row.get(1)?,
        guardian_id: row.get(2)?,
        pickup_id:   row.get(3)?,
        pickup_name: row.get(4)?,
        verified_by: row.get(5)?,
        timestamp:   row.get(6)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(Some(raw))
}

fn load_students(
  conn: &rusqlite::Connection,
  sql: &str,
  param: Option<&str>,
) -> rusqlite::Result<Vec<RawStudent>> {
  let ids: Vec<String> = {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
      .query_map(rusqlite::params_from_iter(param), |row| row.get(0))?
      .collect::<rusqlite::Result<_>>()?;
    ids
  };

  let mut out = Vec::with_capacity(ids.len());
  for id in &ids {
    if let Some(raw) = load_student(conn, id)? {
      out.push(raw);
    }
  }
  Ok(out)
}

fn insert_pickups(
  conn: &rusqlite::Connection,
  student_id: &str,
  entries: &[(String, NewAuthorizedPickup)],
) -> rusqlite::Result<()> {
  for (pickup_id, entry) in entries {
    conn.execute(
      "INSERT INTO authorized_pickups (pickup_id, student_id, name, relationship, phone)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![pickup_id, student_id, entry.name, entry.relationship, entry.phone],
    )?;
  }
  Ok(())
}

fn with_ids(entries: Vec<NewAuthorizedPickup>) -> Vec<(String, NewAuthorizedPickup)> {
  entries
    .into_iter()
    .map(|e| (encode_uuid(Uuid::new_v4()), e))
    .collect()
}

fn encode_ids(ids: &[Uuid]) -> Vec<String> { ids.iter().copied().map(encode_uuid).collect() }

fn insert_log(conn: &rusqlite::Connection, entry: &PickupLogEntry) -> rusqlite::Result<()> {
  let cols = encode_log(entry);
  conn.execute(
    "INSERT INTO pickup_logs
       (log_id, student_id, guardian_id, pickup_id, pickup_name, verified_by, timestamp)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      cols.log_id,
      cols.student_id,
      cols.guardian_id,
      cols.pickup_id,
      cols.pickup_name,
      cols.verified_by,
      cols.timestamp,
    ],
  )?;
  Ok(())
}

const GUARDIAN_EXISTS: &str = "SELECT 1 FROM guardians WHERE guardian_id = ?1";
const STUDENT_EXISTS: &str = "SELECT 1 FROM students WHERE student_id = ?1";

// ─── PickupStore impl ────────────────────────────────────────────────────────

impl PickupStore for SqliteStore {
  type Error = Error;

  // ── Guardians ─────────────────────────────────────────────────────────────

  async fn create_guardian(&self, input: NewGuardian) -> Result<Guardian> {
    let id_str        = encode_uuid(Uuid::new_v4());
    let at_str        = encode_dt(Utc::now());
    let role_str      = encode_role(input.role);
    let photo         = input.photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string());
    let children      = encode_ids(&input.children);
    let NewGuardian { name, email, phone, password_hash, .. } = input;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if row_exists(&tx, "SELECT 1 FROM guardians WHERE email = ?1", &email)? {
          return Ok(Write::Duplicate(DUPLICATE_EMAIL));
        }
        tx.execute(
          "INSERT INTO guardians
             (guardian_id, name, email, phone, role, photo, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![id_str, name, email, phone, role_str, photo, password_hash, at_str],
        )?;
        for child in &children {
          tx.execute(
            "INSERT OR IGNORE INTO guardian_children (guardian_id, student_id) VALUES (?1, ?2)",
            rusqlite::params![id_str, child],
          )?;
        }
        let raw = load_guardian(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.map_or(Write::Missing, Write::Applied))
      })
      .await?;

    outcome
      .into_result()?
      .ok_or_else(|| Error::Decode("guardian missing after insert".into()))?
      .into_guardian()
  }

  async fn get_guardian(&self, id: Uuid) -> Result<Option<Guardian>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(load_guardian(conn, &id_str)?))
      .await?;
    raw.map(RawGuardian::into_guardian).transpose()
  }

  async fn list_guardians(&self, role: Option<Role>) -> Result<Vec<Guardian>> {
    let role_str = role.map(encode_role);

    let raws: Vec<RawGuardian> = self
      .conn
      .call(move |conn| {
        let ids: Vec<String> = {
          let mut stmt = conn.prepare(
            "SELECT guardian_id FROM guardians WHERE ?1 IS NULL OR role = ?1 ORDER BY rowid",
          )?;
          let ids = stmt
            .query_map(rusqlite::params![role_str], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
          ids
        };
        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
          if let Some(raw) = load_guardian(conn, id)? {
            out.push(raw);
          }
        }
        Ok(out)
      })
      .await?;

    raws.into_iter().map(RawGuardian::into_guardian).collect()
  }

  async fn update_guardian(&self, id: Uuid, patch: GuardianPatch) -> Result<Option<Guardian>> {
    let id_str   = encode_uuid(id);
    let role_str = patch.role.map(encode_role);
    let children = patch.children.as_deref().map(encode_ids);
    let GuardianPatch { name, email, phone, photo, .. } = patch;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, GUARDIAN_EXISTS, &id_str)? {
          return Ok(Write::Missing);
        }
        if let Some(email) = &email {
          let taken = tx
            .query_row(
              "SELECT 1 FROM guardians WHERE email = ?1 AND guardian_id != ?2",
              rusqlite::params![email, id_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if taken {
            return Ok(Write::Duplicate(DUPLICATE_EMAIL));
          }
        }

        tx.execute(
          "UPDATE guardians SET
             name  = COALESCE(?2, name),
             email = COALESCE(?3, email),
             phone = COALESCE(?4, phone),
             photo = COALESCE(?5, photo),
             role  = COALESCE(?6, role)
           WHERE guardian_id = ?1",
          rusqlite::params![id_str, name, email, phone, photo, role_str],
        )?;

        if let Some(children) = &children {
          tx.execute(
            "DELETE FROM guardian_children WHERE guardian_id = ?1",
            rusqlite::params![id_str],
          )?;
          for child in children {
            tx.execute(
              "INSERT OR IGNORE INTO guardian_children (guardian_id, student_id) VALUES (?1, ?2)",
              rusqlite::params![id_str, child],
            )?;
          }
        }

        let raw = load_guardian(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.map_or(Write::Missing, Write::Applied))
      })
      .await?;

    outcome
      .into_result()?
      .map(RawGuardian::into_guardian)
      .transpose()
  }

  async fn delete_guardian(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM guardians WHERE guardian_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn get_credentials(&self, email: String) -> Result<Option<Credentials>> {
    let row: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT guardian_id, password_hash FROM guardians WHERE email = ?1",
              rusqlite::params![email],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|(id, password_hash)| {
        Ok::<_, Error>(Credentials { guardian_id: decode_uuid(&id)?, password_hash })
      })
      .transpose()
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn create_session(&self, session: Session) -> Result<()> {
    let guardian_str = encode_uuid(session.guardian_id);
    let created_str  = encode_dt(session.created_at);
    let expires_str  = encode_dt(session.expires_at);
    let token_hash   = session.token_hash;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_hash, guardian_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![token_hash, guardian_str, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_session(&self, token_hash: String) -> Result<Option<Session>> {
    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT token_hash, guardian_id, created_at, expires_at
               FROM sessions WHERE token_hash = ?1",
              rusqlite::params![token_hash],
              |row| {
                Ok(RawSession {
                  token_hash:  row.get(0)?,
                  guardian_id: row.get(1)?,
                  created_at:  row.get(2)?,
                  expires_at:  row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSession::into_session).transpose()
  }

  async fn delete_session(&self, token_hash: String) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sessions WHERE token_hash = ?1",
          rusqlite::params![token_hash],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  // ── Students ──────────────────────────────────────────────────────────────

  async fn create_student(&self, input: NewStudent) -> Result<Student> {
    let id_str    = encode_uuid(Uuid::new_v4());
    let at_str    = encode_dt(Utc::now());
    let dob_str   = encode_date(input.date_of_birth);
    let photo     = input.photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string());
    let guardians = encode_ids(&input.guardians);
    let pickups   = with_ids(input.authorized_pickup);
    let NewStudent { student_number, first_name, last_name, grade, .. } = input;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if row_exists(
          &tx,
          "SELECT 1 FROM students WHERE student_number = ?1",
          &student_number,
        )? {
          return Ok(Write::Duplicate(DUPLICATE_STUDENT_NUMBER));
        }
        tx.execute(
          "INSERT INTO students
             (student_id, student_number, first_name, last_name, grade,
              date_of_birth, photo, is_active, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
          rusqlite::params![
            id_str,
            student_number,
            first_name,
            last_name,
            grade,
            dob_str,
            photo,
            at_str,
          ],
        )?;
        for guardian in &guardians {
          tx.execute(
            "INSERT OR IGNORE INTO student_guardians (student_id, guardian_id) VALUES (?1, ?2)",
            rusqlite::params![id_str, guardian],
          )?;
        }
        insert_pickups(&tx, &id_str, &pickups)?;
        let raw = load_student(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.map_or(Write::Missing, Write::Applied))
      })
      .await?;

    outcome
      .into_result()?
      .ok_or_else(|| Error::Decode("student missing after insert".into()))?
      .into_student()
  }

  async fn get_student(&self, id: Uuid) -> Result<Option<Student>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(load_student(conn, &id_str)?))
      .await?;
    raw.map(RawStudent::into_student).transpose()
  }

  async fn list_students(&self) -> Result<Vec<Student>> {
    let raws = self
      .conn
      .call(|conn| {
        Ok(load_students(
          conn,
          "SELECT student_id FROM students ORDER BY rowid",
          None,
        )?)
      })
      .await?;
    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn list_students_for_guardian(&self, guardian_id: Uuid) -> Result<Vec<Student>> {
    let id_str = encode_uuid(guardian_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_students(
          conn,
          "SELECT s.student_id
           FROM students s
           JOIN student_guardians sg ON sg.student_id = s.student_id
           WHERE sg.guardian_id = ?1
           ORDER BY s.rowid",
          Some(&id_str),
        )?)
      })
      .await?;
    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn update_student(&self, id: Uuid, patch: StudentPatch) -> Result<Option<Student>> {
    let id_str    = encode_uuid(id);
    let at_str    = encode_dt(Utc::now());
    let dob_str   = patch.date_of_birth.map(encode_date);
    let guardians = patch.guardians.as_deref().map(encode_ids);
    let StudentPatch {
      student_number,
      first_name,
      last_name,
      grade,
      photo,
      is_active,
      authorized_pickup,
      ..
    } = patch;
    let pickups = authorized_pickup.map(with_ids);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, STUDENT_EXISTS, &id_str)? {
          return Ok(Write::Missing);
        }
        if let Some(number) = &student_number {
          let taken = tx
            .query_row(
              "SELECT 1 FROM students WHERE student_number = ?1 AND student_id != ?2",
              rusqlite::params![number, id_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if taken {
            return Ok(Write::Duplicate(DUPLICATE_STUDENT_NUMBER));
          }
        }

        tx.execute(
          "UPDATE students SET
             student_number = COALESCE(?2, student_number),
             first_name     = COALESCE(?3, first_name),
             last_name      = COALESCE(?4, last_name),
             grade          = COALESCE(?5, grade),
             date_of_birth  = COALESCE(?6, date_of_birth),
             photo          = COALESCE(?7, photo),
             is_active      = COALESCE(?8, is_active),
             updated_at     = ?9
           WHERE student_id = ?1",
          rusqlite::params![
            id_str,
            student_number,
            first_name,
            last_name,
            grade,
            dob_str,
            photo,
            is_active,
            at_str,
          ],
        )?;

        if let Some(guardians) = &guardians {
          tx.execute(
            "DELETE FROM student_guardians WHERE student_id = ?1",
            rusqlite::params![id_str],
          )?;
          for guardian in guardians {
            tx.execute(
              "INSERT OR IGNORE INTO student_guardians (student_id, guardian_id) VALUES (?1, ?2)",
              rusqlite::params![id_str, guardian],
            )?;
          }
        }

        if let Some(pickups) = &pickups {
          tx.execute(
            "DELETE FROM authorized_pickups WHERE student_id = ?1",
            rusqlite::params![id_str],
          )?;
          insert_pickups(&tx, &id_str, pickups)?;
        }

        let raw = load_student(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.map_or(Write::Missing, Write::Applied))
      })
      .await?;

    outcome
      .into_result()?
      .map(RawStudent::into_student)
      .transpose()
  }

  async fn delete_student(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM students WHERE student_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  // ── Cross-references ──────────────────────────────────────────────────────

  async fn guardians_referencing(&self, student_id: Uuid) -> Result<Vec<Uuid>> {
    let id_str = encode_uuid(student_id);
    let ids = self
      .conn
      .call(move |conn| {
        Ok(id_list(
          conn,
          "SELECT guardian_id FROM guardian_children WHERE student_id = ?1 ORDER BY rowid",
          &id_str,
        )?)
      })
      .await?;
    ids.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn students_referencing(&self, guardian_id: Uuid) -> Result<Vec<Uuid>> {
    let id_str = encode_uuid(guardian_id);
    let ids = self
      .conn
      .call(move |conn| {
        Ok(id_list(
          conn,
          "SELECT student_id FROM student_guardians WHERE guardian_id = ?1 ORDER BY rowid",
          &id_str,
        )?)
      })
      .await?;
    ids.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn add_child(&self, guardian_id: Uuid, student_id: Uuid) -> Result<bool> {
    self
      .link(
        "INSERT OR IGNORE INTO guardian_children (guardian_id, student_id) VALUES (?1, ?2)",
        GUARDIAN_EXISTS,
        guardian_id,
        student_id,
      )
      .await
  }

  async fn pull_child(&self, guardian_id: Uuid, student_id: Uuid) -> Result<bool> {
    self
      .link(
        "DELETE FROM guardian_children WHERE guardian_id = ?1 AND student_id = ?2",
        GUARDIAN_EXISTS,
        guardian_id,
        student_id,
      )
      .await
  }

  async fn add_guardian(&self, student_id: Uuid, guardian_id: Uuid) -> Result<bool> {
    self
      .link(
        "INSERT OR IGNORE INTO student_guardians (student_id, guardian_id) VALUES (?1, ?2)",
        STUDENT_EXISTS,
        student_id,
        guardian_id,
      )
      .await
  }

  async fn pull_guardian(&self, student_id: Uuid, guardian_id: Uuid) -> Result<bool> {
    self
      .link(
        "DELETE FROM student_guardians WHERE student_id = ?1 AND guardian_id = ?2",
        STUDENT_EXISTS,
        student_id,
        guardian_id,
      )
      .await
  }

  async fn pull_child_everywhere(&self, student_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(student_id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM guardian_children WHERE student_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(changed as u64)
  }

  async fn pull_guardian_everywhere(&self, guardian_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(guardian_id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM student_guardians WHERE guardian_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(changed as u64)
  }

  // ── Codes and pickups ─────────────────────────────────────────────────────

  async fn add_code(&self, student_id: Uuid, code: IssuedCode) -> Result<bool> {
    let student_str  = encode_uuid(student_id);
    let code_id_str  = encode_uuid(code.code_id);
    let guardian_str = encode_uuid(code.guardian_id);
    let issued_str   = encode_dt(code.issued_at);
    let expires_str  = encode_dt(code.expires_at);
    let token        = code.code;

    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, STUDENT_EXISTS, &student_str)? {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO issued_codes (code_id, student_id, code, guardian_id, issued_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![code_id_str, student_str, token, guardian_str, issued_str, expires_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(stored)
  }

  async fn redeem_code(
    &self,
    student_id: Uuid,
    code_id: Uuid,
    entry: PickupLogEntry,
  ) -> Result<bool> {
    let student_str = encode_uuid(student_id);
    let code_id_str = encode_uuid(code_id);
    let now_str     = encode_dt(entry.timestamp);

    let redeemed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute(
          "DELETE FROM issued_codes
           WHERE code_id = ?1 AND student_id = ?2 AND expires_at > ?3",
          rusqlite::params![code_id_str, student_str, now_str],
        )?;
        if removed == 0 {
          return Ok(false);
        }
        insert_log(&tx, &entry)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(redeemed)
  }

  async fn set_pickup_person_code(
    &self,
    student_id: Uuid,
    pickup_id: Uuid,
    code: String,
    expires_at: DateTime<Utc>,
  ) -> Result<bool> {
    let student_str = encode_uuid(student_id);
    let pickup_str  = encode_uuid(pickup_id);
    let expires_str = encode_dt(expires_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE authorized_pickups SET code = ?3, code_expires_at = ?4
           WHERE pickup_id = ?1 AND student_id = ?2",
          rusqlite::params![pickup_str, student_str, code, expires_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn redeem_pickup_person_code(
    &self,
    student_id: Uuid,
    pickup_id: Uuid,
    code: String,
    entry: PickupLogEntry,
  ) -> Result<bool> {
    let student_str = encode_uuid(student_id);
    let pickup_str  = encode_uuid(pickup_id);
    let now_str     = encode_dt(entry.timestamp);

    let redeemed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let cleared = tx.execute(
          "UPDATE authorized_pickups SET code = NULL, code_expires_at = NULL
           WHERE pickup_id = ?1 AND student_id = ?2 AND code = ?3 AND code_expires_at > ?4",
          rusqlite::params![pickup_str, student_str, code, now_str],
        )?;
        if cleared == 0 {
          return Ok(false);
        }
        insert_log(&tx, &entry)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(redeemed)
  }
}
