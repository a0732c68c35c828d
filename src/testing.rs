//! Store double for unit tests: a real in-memory SQLite store with switches
//! that make reads or writes fail on demand.

use crate::model::{AttendanceRow, NewStudent, Student};
use crate::store::{RosterStore, SqliteStore, StoreError};
use std::cell::Cell;

pub struct ScriptedStore {
    inner: SqliteStore,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
    fail_batches: Cell<bool>,
    pub batch_calls: Cell<usize>,
    pub single_calls: Cell<usize>,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self {
            inner: SqliteStore::in_memory(),
            fail_reads: Cell::new(false),
            fail_writes: Cell::new(false),
            fail_batches: Cell::new(false),
            batch_calls: Cell::new(0),
            single_calls: Cell::new(0),
        }
    }
}

impl ScriptedStore {
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.set(on);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.set(on);
    }

    /// Multi-row inserts fail; single-row inserts still go through.
    pub fn fail_batches(&self, on: bool) {
        self.fail_batches.set(on);
    }

    fn refused(&self, flag: &Cell<bool>) -> Result<(), StoreError> {
        if flag.get() {
            return Err(StoreError::InvalidRow("scripted failure".into()));
        }
        Ok(())
    }
}

impl RosterStore for ScriptedStore {
    fn fetch_students(&self) -> Result<Vec<Student>, StoreError> {
        self.refused(&self.fail_reads)?;
        self.inner.fetch_students()
    }

    fn insert_students(&self, rows: &[NewStudent]) -> Result<Vec<Student>, StoreError> {
        self.batch_calls.set(self.batch_calls.get() + 1);
        self.refused(&self.fail_writes)?;
        self.refused(&self.fail_batches)?;
        self.inner.insert_students(rows)
    }

    fn insert_student(&self, row: &NewStudent) -> Result<Student, StoreError> {
        self.single_calls.set(self.single_calls.get() + 1);
        self.refused(&self.fail_writes)?;
        self.inner.insert_student(row)
    }

    fn update_student(&self, id: &str, row: &NewStudent) -> Result<Student, StoreError> {
        self.refused(&self.fail_writes)?;
        self.inner.update_student(id, row)
    }

    fn delete_student(&self, id: &str) -> Result<(), StoreError> {
        self.refused(&self.fail_writes)?;
        self.inner.delete_student(id)
    }

    fn fetch_attendance(&self) -> Result<Vec<AttendanceRow>, StoreError> {
        self.refused(&self.fail_reads)?;
        self.inner.fetch_attendance()
    }

    fn upsert_attendance(&self, rows: &[AttendanceRow]) -> Result<(), StoreError> {
        self.refused(&self.fail_writes)?;
        self.inner.upsert_attendance(rows)
    }

    fn delete_attendance(&self, student_id: &str, date: &str) -> Result<(), StoreError> {
        self.refused(&self.fail_writes)?;
        self.inner.delete_attendance(student_id, date)
    }
}
