//! `SQLite` backend: schema, pragmas, migrations, and the student store.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::model::types::{CourseRecord, InstructorPrivilege, StudentRecord};

/// Keyed lookups the search pipeline needs from persistent storage.
pub trait StudentStore: Send + Sync {
    fn find_course(&self, course_id: &str) -> Result<Option<CourseRecord>>;

    fn find_student_by_email(&self, course_id: &str, email: &str)
    -> Result<Option<StudentRecord>>;

    fn find_student(&self, id: &str) -> Result<Option<StudentRecord>>;
}

const SCHEMA_VERSION: i64 = 1;

const MIGRATION_V1: &str = r"
CREATE TABLE IF NOT EXISTS courses (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY,
    course_id TEXT NOT NULL,
    email TEXT NOT NULL,
    name TEXT NOT NULL,
    team TEXT NOT NULL DEFAULT '',
    section TEXT NOT NULL DEFAULT '',
    registered INTEGER NOT NULL DEFAULT 0,
    UNIQUE(course_id, email)
);

CREATE TABLE IF NOT EXISTS instructors (
    course_id TEXT NOT NULL,
    email TEXT NOT NULL,
    can_view_student_in_sections INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (course_id, email)
);

CREATE INDEX IF NOT EXISTS idx_instructors_email ON instructors(email);
";

const STUDENT_COLUMNS: &str = "id, name, email, course_id, team, section, registered";

/// Connection is serialized behind a mutex so the store can be shared across threads.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating db directory {}", parent.display()))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("opening sqlite db at {}", path.display()))?;

        apply_pragmas(&conn)?;
        init_meta(&conn)?;
        migrate(&mut conn)?;
        info!(path = %path.display(), "student store opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("opening in-memory sqlite db")?;
        init_meta(&conn)?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .lock()
            .query_row(
                "SELECT value FROM meta WHERE key='schema_version'",
                [],
                |row| row.get::<_, String>(0).map(|s| s.parse().unwrap_or(0)),
            )
            .optional()?
            .ok_or_else(|| anyhow!("schema_version missing"))
    }

    pub fn upsert_course(&self, course: &CourseRecord) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO courses(id, name) VALUES(?,?)
                 ON CONFLICT(id) DO UPDATE SET name=excluded.name",
                params![&course.id, &course.name],
            )
            .with_context(|| format!("upserting course {}", course.id))?;
        Ok(())
    }

    /// Insert or replace by `id`; `(course_id, email)` stays unique.
    pub fn upsert_student(&self, student: &StudentRecord) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO students(id, name, email, course_id, team, section, registered)
                 VALUES(?,?,?,?,?,?,?)
                 ON CONFLICT(id) DO UPDATE SET name=excluded.name, email=excluded.email,
                   course_id=excluded.course_id, team=excluded.team,
                   section=excluded.section, registered=excluded.registered",
                params![
                    &student.id,
                    &student.name,
                    &student.email,
                    &student.course_id,
                    &student.team,
                    &student.section,
                    student.registered,
                ],
            )
            .with_context(|| format!("upserting student {}", student.id))?;
        Ok(())
    }

    pub fn delete_student(&self, id: &str) -> Result<bool> {
        let n = self
            .conn
            .lock()
            .execute("DELETE FROM students WHERE id = ?", params![id])?;
        Ok(n > 0)
    }

    pub fn upsert_instructor(&self, privilege: &InstructorPrivilege) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO instructors(course_id, email, can_view_student_in_sections) VALUES(?,?,?)
                 ON CONFLICT(course_id, email) DO UPDATE
                   SET can_view_student_in_sections=excluded.can_view_student_in_sections",
                params![
                    &privilege.course_id,
                    &privilege.email,
                    privilege.can_view_student_in_sections
                ],
            )
            .with_context(|| {
                format!(
                    "upserting instructor {} in {}",
                    privilege.email, privilege.course_id
                )
            })?;
        Ok(())
    }

    /// Every course-level privilege row for one instructor account.
    pub fn instructor_privileges(&self, email: &str) -> Result<Vec<InstructorPrivilege>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT course_id, email, can_view_student_in_sections FROM instructors
             WHERE email = ? ORDER BY course_id",
        )?;
        let rows = stmt.query_map(params![email], |row| {
            Ok(InstructorPrivilege {
                course_id: row.get(0)?,
                email: row.get(1)?,
                can_view_student_in_sections: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_students(&self) -> Result<Vec<StudentRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students ORDER BY course_id, email"
        ))?;
        let rows = stmt.query_map([], student_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_students_in_course(&self, course_id: &str) -> Result<Vec<StudentRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE course_id = ? ORDER BY email"
        ))?;
        let rows = stmt.query_map(params![course_id], student_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl StudentStore for SqliteStorage {
    fn find_course(&self, course_id: &str) -> Result<Option<CourseRecord>> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, name FROM courses WHERE id = ?",
                params![course_id],
                |row| {
                    Ok(CourseRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("fetching course {course_id}"))
    }

    fn find_student_by_email(&self, course_id: &str, email: &str) -> Result<Option<StudentRecord>> {
        self.conn
            .lock()
            .query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE course_id = ? AND email = ?"),
                params![course_id, email],
                student_from_row,
            )
            .optional()
            .with_context(|| format!("fetching student {email} in {course_id}"))
    }

    fn find_student(&self, id: &str) -> Result<Option<StudentRecord>> {
        self.conn
            .lock()
            .query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"),
                params![id],
                student_from_row,
            )
            .optional()
            .with_context(|| format!("fetching student {id}"))
    }
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    Ok(StudentRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        course_id: row.get(3)?,
        team: row.get(4)?,
        section: row.get(5)?,
        registered: row.get(6)?,
    })
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(
        r"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

fn init_meta(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0).map(|s| s.parse().unwrap_or(0)),
        )
        .optional()?;

    if existing.is_none() {
        // Version 0 makes migrate() apply the full schema on first open.
        conn.execute(
            "INSERT INTO meta(key, value) VALUES('schema_version', '0')",
            [],
        )?;
    }

    Ok(())
}

fn migrate(conn: &mut Connection) -> Result<()> {
    let current: i64 = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0).map(|s| s.parse().unwrap_or(0)),
        )
        .optional()?
        .unwrap_or(0);

    if current == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    match current {
        0 => tx.execute_batch(MIGRATION_V1)?,
        v => return Err(anyhow!("unsupported schema version {v}")),
    }
    tx.execute(
        "UPDATE meta SET value = ? WHERE key = 'schema_version'",
        params![SCHEMA_VERSION.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}
