//! Backend adapter: maps students and attendance rows to SQL tables.

use crate::db;
use crate::model::{AttendanceRow, AttendanceStatus, NewStudent, Student};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

/// CRUD surface of the backend. Every call is a single round trip; multi-row
/// writes are all-or-nothing.
pub trait RosterStore {
    fn fetch_students(&self) -> Result<Vec<Student>, StoreError>;

    /// Inserts all rows or none. Returned students follow input order.
    fn insert_students(&self, rows: &[NewStudent]) -> Result<Vec<Student>, StoreError>;

    fn insert_student(&self, row: &NewStudent) -> Result<Student, StoreError>;

    fn update_student(&self, id: &str, row: &NewStudent) -> Result<Student, StoreError>;

    /// Removes the student and their attendance rows.
    fn delete_student(&self, id: &str) -> Result<(), StoreError>;

    fn fetch_attendance(&self) -> Result<Vec<AttendanceRow>, StoreError>;

    fn upsert_attendance(&self, rows: &[AttendanceRow]) -> Result<(), StoreError>;

    fn delete_attendance(&self, student_id: &str, date: &str) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::init_schema(&conn).expect("init schema");
        Self { conn }
    }

    fn insert_one(conn: &Connection, row: &NewStudent) -> Result<Student, StoreError> {
        let student = Student {
            id: Uuid::new_v4().to_string(),
            roll_number: row.roll_number,
            full_name: row.full_name.clone(),
            class_id: row.class_id.clone(),
            age: row.age,
            phone: row.phone.clone(),
            alt_phone: row.alt_phone.clone(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        conn.execute(
            "INSERT INTO students(id, full_name, class_id, roll_number, age, phone, alt_phone, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &student.id,
                &student.full_name,
                &student.class_id,
                student.roll_number,
                student.age,
                &student.phone,
                &student.alt_phone,
                &student.created_at,
            ),
        )?;
        Ok(student)
    }

    fn get_student(&self, id: &str) -> Result<Student, StoreError> {
        self.conn
            .query_row(
                &format!("{STUDENT_SELECT} WHERE id = ?"),
                [id],
                student_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "student",
                id: id.to_string(),
            })
    }
}

const STUDENT_SELECT: &str =
    "SELECT id, full_name, class_id, roll_number, age, phone, alt_phone, created_at FROM students";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        full_name: r.get(1)?,
        class_id: r.get(2)?,
        roll_number: r.get(3)?,
        age: r.get(4)?,
        phone: r.get(5)?,
        alt_phone: r.get(6)?,
        created_at: r.get(7)?,
    })
}

impl RosterStore for SqliteStore {
    fn fetch_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STUDENT_SELECT} ORDER BY created_at, rowid"))?;
        let students = stmt
            .query_map([], student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    fn insert_students(&self, rows: &[NewStudent]) -> Result<Vec<Student>, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            // Dropping `tx` on the error path rolls the whole chunk back.
            out.push(Self::insert_one(&tx, row)?);
        }
        tx.commit()?;
        Ok(out)
    }

    fn insert_student(&self, row: &NewStudent) -> Result<Student, StoreError> {
        Self::insert_one(&self.conn, row)
    }

    fn update_student(&self, id: &str, row: &NewStudent) -> Result<Student, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE students
             SET full_name = ?, class_id = ?, roll_number = ?, age = ?, phone = ?, alt_phone = ?
             WHERE id = ?",
            (
                &row.full_name,
                &row.class_id,
                row.roll_number,
                row.age,
                &row.phone,
                &row.alt_phone,
                id,
            ),
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "student",
                id: id.to_string(),
            });
        }
        // Attendance rows carry the class for row-level filtering; keep them aligned.
        tx.execute(
            "UPDATE attendance SET class_id = ? WHERE student_id = ?",
            (&row.class_id, id),
        )?;
        tx.commit()?;
        self.get_student(id)
    }

    fn delete_student(&self, id: &str) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        // Dependency order: no ON DELETE CASCADE.
        tx.execute("DELETE FROM attendance WHERE student_id = ?", [id])?;
        let changed = tx.execute("DELETE FROM students WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "student",
                id: id.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn fetch_attendance(&self) -> Result<Vec<AttendanceRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, class_id, date, status FROM attendance ORDER BY date, student_id",
        )?;
        let raw = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(student_id, class_id, date, status)| {
                let status = status
                    .parse::<AttendanceStatus>()
                    .map_err(StoreError::InvalidRow)?;
                Ok(AttendanceRow {
                    student_id,
                    class_id,
                    date,
                    status,
                })
            })
            .collect()
    }

    fn upsert_attendance(&self, rows: &[AttendanceRow]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        for row in rows {
            tx.execute(
                "INSERT INTO attendance(student_id, class_id, date, status)
                 VALUES(?, ?, ?, ?)
                 ON CONFLICT(student_id, date) DO UPDATE SET
                   class_id = excluded.class_id,
                   status = excluded.status",
                (&row.student_id, &row.class_id, &row.date, row.status.code()),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_attendance(&self, student_id: &str, date: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM attendance WHERE student_id = ? AND date = ?",
            (student_id, date),
        )?;
        Ok(())
    }
}
