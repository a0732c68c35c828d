use crate::attendance::AttendanceMap;
use crate::error::AppError;
use crate::model::Student;
use crate::store::{RosterStore, StoreError};
use std::cmp::Ordering;
use tracing::warn;

/// Cached copy of the students table. Kept sorted by class, roll number, name.
#[derive(Debug, Default)]
pub struct RosterCache {
    students: Vec<Student>,
}

impl RosterCache {
    pub fn replace_all(&mut self, students: Vec<Student>) {
        self.students = students;
        self.students.sort_by(roster_order);
    }

    /// Re-fetches all students. On failure the cached list is kept.
    pub fn refresh<S: RosterStore + ?Sized>(&mut self, store: &S) -> Result<usize, AppError> {
        let students = store.fetch_students().map_err(|source| AppError::Load {
            what: "students",
            source,
        })?;
        self.replace_all(students);
        Ok(self.students.len())
    }

    /// Discards an optimistic edit the store rejected by re-fetching the
    /// roster. `rollback` runs only if that re-fetch fails too.
    pub fn reject<S: RosterStore + ?Sized>(
        &mut self,
        store: &S,
        source: StoreError,
        rollback: impl FnOnce(&mut Self),
    ) -> AppError {
        warn!(error = %source, "student write rejected; resyncing roster");
        match store.fetch_students() {
            Ok(students) => {
                self.replace_all(students);
                AppError::Write {
                    source,
                    reconciled: true,
                }
            }
            Err(resync) => {
                warn!(error = %resync, "roster resync failed; rolling back");
                rollback(self);
                AppError::Write {
                    source,
                    reconciled: false,
                }
            }
        }
    }

    pub fn all(&self) -> &[Student] {
        &self.students
    }

    pub fn for_class(&self, class_id: &str) -> Vec<Student> {
        self.students
            .iter()
            .filter(|s| s.class_id == class_id)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn count_in_class(&self, class_id: &str) -> usize {
        self.students.iter().filter(|s| s.class_id == class_id).count()
    }

    /// Inserts or replaces by id.
    pub fn upsert(&mut self, student: Student) {
        match self.students.iter_mut().find(|s| s.id == student.id) {
            Some(slot) => *slot = student,
            None => self.students.push(student),
        }
        self.students.sort_by(roster_order);
    }

    pub fn merge(&mut self, created: impl IntoIterator<Item = Student>) {
        for s in created {
            match self.students.iter_mut().find(|x| x.id == s.id) {
                Some(slot) => *slot = s,
                None => self.students.push(s),
            }
        }
        self.students.sort_by(roster_order);
    }

    pub fn remove(&mut self, id: &str) -> Option<Student> {
        let pos = self.students.iter().position(|s| s.id == id)?;
        Some(self.students.remove(pos))
    }
}

/// Drops a student and their attendance from both caches, then deletes them in
/// the store. Returns `Ok(false)` when the student is not cached.
pub fn delete_student<S: RosterStore + ?Sized>(
    roster: &mut RosterCache,
    attendance: &mut AttendanceMap,
    store: &S,
    student_id: &str,
) -> Result<bool, AppError> {
    let Some(previous) = roster.remove(student_id) else {
        return Ok(false);
    };
    let days = attendance.remove_student(student_id);

    let source = match store.delete_student(student_id) {
        Ok(()) => return Ok(true),
        Err(e) => e,
    };
    let mut err = roster.reject(store, source, |c| c.upsert(previous));
    if attendance.refresh(store).is_err() {
        warn!(student_id, "attendance resync failed; restoring removed days");
        attendance.restore_student(student_id, days.unwrap_or_default());
        if let AppError::Write { reconciled, .. } = &mut err {
            *reconciled = false;
        }
    }
    Err(err)
}

/// Unnumbered students sort after numbered ones.
pub fn roster_order(a: &Student, b: &Student) -> Ordering {
    a.class_id
        .cmp(&b.class_id)
        .then_with(|| match (a.roll_number, b.roll_number) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, class_id: &str, roll: Option<i64>, name: &str) -> Student {
        Student {
            id: id.into(),
            roll_number: roll,
            full_name: name.into(),
            class_id: class_id.into(),
            age: None,
            phone: None,
            alt_phone: None,
            created_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn sorted_by_class_roll_then_name() {
        let mut cache = RosterCache::default();
        cache.replace_all(vec![
            student("a", "C2", Some(1), "Zed"),
            student("b", "C1", None, "Abel"),
            student("c", "C1", Some(2), "Hana"),
            student("d", "C1", Some(1), "Yonas"),
        ]);
        let ids: Vec<&str> = cache.all().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "b", "a"]);
        assert_eq!(cache.count_in_class("C1"), 3);
    }

    #[test]
    fn rejected_edit_resyncs_from_store() {
        use crate::model::NewStudent;
        use crate::testing::ScriptedStore;

        let store = ScriptedStore::default();
        let abel = store
            .insert_student(&NewStudent {
                full_name: "Abel".into(),
                class_id: "C1".into(),
                ..Default::default()
            })
            .expect("insert");
        let mut cache = RosterCache::default();
        cache.refresh(&store).expect("load");

        let mut edited = abel.clone();
        edited.full_name = "Abel Tesfaye".into();
        cache.upsert(edited);

        let err = cache.reject(&store, StoreError::InvalidRow("nope".into()), |_| {});
        assert!(matches!(err, AppError::Write { reconciled: true, .. }));
        assert_eq!(cache.get(&abel.id).map(|s| s.full_name.as_str()), Some("Abel"));

        store.fail_reads(true);
        let before = abel.clone();
        cache.remove(&abel.id);
        let err = cache.reject(&store, StoreError::InvalidRow("nope".into()), |c| {
            c.upsert(before)
        });
        assert!(matches!(err, AppError::Write { reconciled: false, .. }));
        assert!(cache.get(&abel.id).is_some());
    }

    fn loaded_with_mark() -> (crate::testing::ScriptedStore, RosterCache, AttendanceMap, String) {
        use crate::model::{AttendanceRow, AttendanceStatus, NewStudent};

        let store = crate::testing::ScriptedStore::default();
        let abel = store
            .insert_student(&NewStudent {
                full_name: "Abel".into(),
                class_id: "C1".into(),
                ..Default::default()
            })
            .expect("insert");
        store
            .upsert_attendance(&[AttendanceRow {
                student_id: abel.id.clone(),
                class_id: "C1".into(),
                date: "2024-01-07".into(),
                status: AttendanceStatus::Present,
            }])
            .expect("mark");
        let mut roster = RosterCache::default();
        roster.refresh(&store).expect("load roster");
        let mut attendance = AttendanceMap::default();
        attendance.refresh(&store).expect("load attendance");
        (store, roster, attendance, abel.id)
    }

    #[test]
    fn delete_removes_student_and_days() {
        let (store, mut roster, mut attendance, id) = loaded_with_mark();
        assert!(delete_student(&mut roster, &mut attendance, &store, &id).expect("delete"));
        assert!(roster.get(&id).is_none());
        assert!(attendance.days(&id).is_none());
        assert!(store.fetch_attendance().expect("fetch").is_empty());
        assert!(!delete_student(&mut roster, &mut attendance, &store, &id).expect("again"));
    }

    #[test]
    fn rejected_delete_resyncs_both_caches() {
        let (store, mut roster, mut attendance, id) = loaded_with_mark();
        store.fail_writes(true);
        let err = delete_student(&mut roster, &mut attendance, &store, &id).expect_err("rejected");
        assert!(matches!(err, AppError::Write { reconciled: true, .. }));
        assert!(roster.get(&id).is_some());
        assert_eq!(attendance.len(), 1);
    }

    #[test]
    fn rejected_delete_rolls_back_when_resync_fails() {
        let (store, mut roster, mut attendance, id) = loaded_with_mark();
        store.fail_writes(true);
        store.fail_reads(true);
        let err = delete_student(&mut roster, &mut attendance, &store, &id).expect_err("rejected");
        assert!(matches!(err, AppError::Write { reconciled: false, .. }));
        assert!(roster.get(&id).is_some());
        assert!(attendance.get(&id, "2024-01-07").is_some());
    }

    #[test]
    fn upsert_replaces_existing() {
        let mut cache = RosterCache::default();
        cache.replace_all(vec![student("a", "C1", Some(1), "Abel")]);
        cache.upsert(student("a", "C3", Some(1), "Abel"));
        assert_eq!(cache.all().len(), 1);
        assert_eq!(cache.get("a").map(|s| s.class_id.as_str()), Some("C3"));
        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
    }
}
