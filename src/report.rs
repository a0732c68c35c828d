use crate::attendance::AttendanceMap;
use crate::model::{AttendanceStatus, Student};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

/// Inclusive bounds on ISO dates. Either side may be open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateRange {
    /// ISO dates order lexicographically the same as by calendar.
    pub fn contains(&self, date: &str) -> bool {
        self.from.as_deref().map_or(true, |f| date >= f)
            && self.to.as_deref().map_or(true, |t| date <= t)
    }
}

/// Accepts `YYYY-MM-DD` (calendar-valid) and returns it zero-padded.
pub fn normalize_date(raw: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| format!("date must be YYYY-MM-DD: {raw:?}"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    #[serde(rename = "P")]
    pub present: u32,
    #[serde(rename = "PR")]
    pub permission: u32,
    #[serde(rename = "A")]
    pub absent: u32,
}

impl StatusCounts {
    pub fn total(&self) -> u32 {
        self.present + self.permission + self.absent
    }

    fn bump(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Permission => self.permission += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }

    /// Nearest-integer share of each status; all zero when there is nothing to count.
    pub fn percentages(&self) -> StatusCounts {
        let total = self.total();
        let pct = |n: u32| -> u32 {
            if total == 0 {
                0
            } else {
                (f64::from(n) * 100.0 / f64::from(total)).round() as u32
            }
        };
        StatusCounts {
            present: pct(self.present),
            permission: pct(self.permission),
            absent: pct(self.absent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Absentee {
    pub student_id: String,
    pub roll_number: Option<i64>,
    pub full_name: String,
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub class_id: String,
    pub range: DateRange,
    pub roster_size: usize,
    pub session_dates: usize,
    pub total_records: u32,
    pub counts: StatusCounts,
    pub percentages: StatusCounts,
    pub absentees: Vec<Absentee>,
}

/// Dates inside `range` on which at least one roster student has a record.
pub fn session_dates(roster: &[&Student], map: &AttendanceMap, range: &DateRange) -> Vec<String> {
    let mut dates = BTreeSet::new();
    for s in roster {
        if let Some(days) = map.days(&s.id) {
            dates.extend(days.keys().filter(|d| range.contains(d)).cloned());
        }
    }
    dates.into_iter().collect()
}

/// Builds the class report. Absence is a stored `A` or no record at all on a
/// session date.
pub fn build_class_report(
    students: &[Student],
    map: &AttendanceMap,
    class_id: &str,
    range: &DateRange,
) -> ClassReport {
    let roster: Vec<&Student> = students.iter().filter(|s| s.class_id == class_id).collect();
    let dates = session_dates(&roster, map, range);

    let mut counts = StatusCounts::default();
    let mut absentees = Vec::new();
    for s in &roster {
        let mut missed = Vec::new();
        for date in &dates {
            let status = map.get(&s.id, date).unwrap_or(AttendanceStatus::Absent);
            counts.bump(status);
            if status == AttendanceStatus::Absent {
                missed.push(date.clone());
            }
        }
        if !missed.is_empty() {
            absentees.push(Absentee {
                student_id: s.id.clone(),
                roll_number: s.roll_number,
                full_name: s.full_name.clone(),
                dates: missed,
            });
        }
    }

    ClassReport {
        class_id: class_id.to_string(),
        range: range.clone(),
        roster_size: roster.len(),
        session_dates: dates.len(),
        total_records: counts.total(),
        percentages: counts.percentages(),
        counts,
        absentees,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub student_id: String,
    pub roll_number: Option<i64>,
    pub full_name: String,
    /// Parallel to `HistoryGrid::dates`; `None` means unmarked.
    pub statuses: Vec<Option<AttendanceStatus>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryGrid {
    pub class_id: String,
    pub range: DateRange,
    pub dates: Vec<String>,
    pub rows: Vec<HistoryRow>,
}

pub fn build_history(
    students: &[Student],
    map: &AttendanceMap,
    class_id: &str,
    range: &DateRange,
) -> HistoryGrid {
    let roster: Vec<&Student> = students.iter().filter(|s| s.class_id == class_id).collect();
    let dates = session_dates(&roster, map, range);
    let rows = roster
        .iter()
        .map(|s| HistoryRow {
            student_id: s.id.clone(),
            roll_number: s.roll_number,
            full_name: s.full_name.clone(),
            statuses: dates.iter().map(|d| map.get(&s.id, d)).collect(),
        })
        .collect();
    HistoryGrid {
        class_id: class_id.to_string(),
        range: range.clone(),
        dates,
        rows,
    }
}
