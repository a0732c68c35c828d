//! In-memory attendance index with optimistic, store-confirmed edits.
//!
//! Every mutation is two-phase: the edit is staged into the map right away,
//! then the store write either confirms it or the map is resynchronized from
//! the store. Edits are never inverted by hand unless the resync itself fails.

use crate::error::AppError;
use crate::model::{AttendanceRow, AttendanceStatus};
use crate::store::{RosterStore, StoreError};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

pub type DayStatuses = BTreeMap<String, AttendanceStatus>;

#[derive(Debug, Default)]
pub struct AttendanceMap {
    by_student: HashMap<String, DayStatuses>,
}

/// A local change not yet confirmed by the store.
#[derive(Debug)]
#[must_use]
pub struct StagedEdit {
    student_id: String,
    date: String,
    previous: Option<AttendanceStatus>,
}

impl AttendanceMap {
    #[cfg(test)]
    pub fn from_rows(rows: impl IntoIterator<Item = AttendanceRow>) -> Self {
        let mut map = Self::default();
        map.replace_from_rows(rows);
        map
    }

    pub fn replace_from_rows(&mut self, rows: impl IntoIterator<Item = AttendanceRow>) {
        self.by_student.clear();
        for row in rows {
            self.by_student
                .entry(row.student_id)
                .or_default()
                .insert(row.date, row.status);
        }
    }

    pub fn get(&self, student_id: &str, date: &str) -> Option<AttendanceStatus> {
        self.by_student
            .get(student_id)
            .and_then(|days| days.get(date))
            .copied()
    }

    pub fn days(&self, student_id: &str) -> Option<&DayStatuses> {
        self.by_student.get(student_id)
    }

    /// Total number of (student, date) entries.
    pub fn len(&self) -> usize {
        self.by_student.values().map(|d| d.len()).sum()
    }

    pub fn remove_student(&mut self, student_id: &str) -> Option<DayStatuses> {
        self.by_student.remove(student_id)
    }

    /// Puts back entries taken by `remove_student`.
    pub fn restore_student(&mut self, student_id: &str, days: DayStatuses) {
        if !days.is_empty() {
            self.by_student.insert(student_id.to_string(), days);
        }
    }

    /// Applies a tentative change and remembers what it replaced.
    pub fn stage(
        &mut self,
        student_id: &str,
        date: &str,
        next: Option<AttendanceStatus>,
    ) -> StagedEdit {
        let previous = self.put(student_id, date, next);
        StagedEdit {
            student_id: student_id.to_string(),
            date: date.to_string(),
            previous,
        }
    }

    /// Confirms the staged edits on success. On rejection the map is re-fetched
    /// from the store; if that also fails the staged edits are rolled back.
    pub fn settle<S: RosterStore + ?Sized>(
        &mut self,
        store: &S,
        staged: Vec<StagedEdit>,
        outcome: Result<(), StoreError>,
    ) -> Result<(), AppError> {
        let source = match outcome {
            Ok(()) => {
                debug!(edits = staged.len(), "attendance edits confirmed");
                return Ok(());
            }
            Err(e) => e,
        };
        warn!(error = %source, edits = staged.len(), "attendance write rejected; resyncing");
        match store.fetch_attendance() {
            Ok(rows) => {
                self.replace_from_rows(rows);
                Err(AppError::Write {
                    source,
                    reconciled: true,
                })
            }
            Err(resync) => {
                warn!(error = %resync, "attendance resync failed; rolling back staged edits");
                for edit in staged.into_iter().rev() {
                    let _ = self.put(&edit.student_id, &edit.date, edit.previous);
                }
                Err(AppError::Write {
                    source,
                    reconciled: false,
                })
            }
        }
    }

    /// Re-fetches everything. A failed load leaves the current map untouched.
    pub fn refresh<S: RosterStore + ?Sized>(&mut self, store: &S) -> Result<usize, AppError> {
        let rows = store.fetch_attendance().map_err(|source| AppError::Load {
            what: "attendance",
            source,
        })?;
        self.replace_from_rows(rows);
        Ok(self.len())
    }

    /// Write-through upsert of one or more marks.
    pub fn mark<S: RosterStore + ?Sized>(
        &mut self,
        store: &S,
        rows: Vec<AttendanceRow>,
    ) -> Result<(), AppError> {
        let staged = rows
            .iter()
            .map(|r| self.stage(&r.student_id, &r.date, Some(r.status)))
            .collect();
        let outcome = store.upsert_attendance(&rows);
        self.settle(store, staged, outcome)
    }

    /// Write-through delete of a single (student, date) entry.
    pub fn clear<S: RosterStore + ?Sized>(
        &mut self,
        store: &S,
        student_id: &str,
        date: &str,
    ) -> Result<(), AppError> {
        let staged = vec![self.stage(student_id, date, None)];
        let outcome = store.delete_attendance(student_id, date);
        self.settle(store, staged, outcome)
    }

    fn put(
        &mut self,
        student_id: &str,
        date: &str,
        status: Option<AttendanceStatus>,
    ) -> Option<AttendanceStatus> {
        match status {
            Some(s) => self
                .by_student
                .entry(student_id.to_string())
                .or_default()
                .insert(date.to_string(), s),
            None => {
                let days = self.by_student.get_mut(student_id)?;
                let prev = days.remove(date);
                if days.is_empty() {
                    self.by_student.remove(student_id);
                }
                prev
            }
        }
    }
}
