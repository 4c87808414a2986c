//! SQL schema for the pickup SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// The two link tables are independent: `guardian_children` is
/// the guardian's side and `student_guardians` the student's side. Neither
/// carries a foreign key to the counterpart, so keeping them mirrored is the
/// synchroniser's job.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS guardians (
    guardian_id   TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    phone         TEXT,
    role          TEXT NOT NULL,   -- 'guardian' | 'staff' | 'admin'
    photo         TEXT NOT NULL,
    password_hash TEXT NOT NULL,   -- argon2 PHC string
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS guardian_children (
    guardian_id TEXT NOT NULL REFERENCES guardians(guardian_id) ON DELETE CASCADE,
    student_id  TEXT NOT NULL,
    PRIMARY KEY (guardian_id, student_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    token_hash  TEXT PRIMARY KEY,   -- SHA-256 hex of the bearer token
    guardian_id TEXT NOT NULL REFERENCES guardians(guardian_id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    student_id     TEXT PRIMARY KEY,
    student_number TEXT NOT NULL UNIQUE,
    first_name     TEXT NOT NULL,
    last_name      TEXT NOT NULL,
    grade          TEXT NOT NULL,
    date_of_birth  TEXT NOT NULL,   -- YYYY-MM-DD
    photo          TEXT NOT NULL,
    is_active      INTEGER NOT NULL DEFAULT 1,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student_guardians (
    student_id  TEXT NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
    guardian_id TEXT NOT NULL,
    PRIMARY KEY (student_id, guardian_id)
);

CREATE TABLE IF NOT EXISTS authorized_pickups (
    pickup_id       TEXT PRIMARY KEY,
    student_id      TEXT NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    relationship    TEXT NOT NULL,
    phone           TEXT NOT NULL,
    code            TEXT,
    code_expires_at TEXT
);

-- Outstanding codes. Redemption deletes the row; expired rows are left in
-- place and simply fail the validity check.
CREATE TABLE IF NOT EXISTS issued_codes (
    code_id     TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
    code        TEXT NOT NULL,
    guardian_id TEXT NOT NULL,
    issued_at   TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

-- Pickup history is append-only; rows go away only with their student.
CREATE TABLE IF NOT EXISTS pickup_logs (
    log_id      TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
    guardian_id TEXT,              -- set when a guardian collected
    pickup_id   TEXT,              -- set when an authorized person collected
    pickup_name TEXT,
    verified_by TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    CHECK ((guardian_id IS NULL) != (pickup_id IS NULL))
);

CREATE INDEX IF NOT EXISTS guardian_children_student_idx ON guardian_children(student_id);
CREATE INDEX IF NOT EXISTS student_guardians_guardian_idx ON student_guardians(guardian_id);
CREATE INDEX IF NOT EXISTS issued_codes_student_idx       ON issued_codes(student_id);
CREATE INDEX IF NOT EXISTS pickup_logs_student_idx        ON pickup_logs(student_id);

PRAGMA user_version = 1;
";
