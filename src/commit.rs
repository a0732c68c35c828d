//! Batch commit of imported rows: chunked inserts that fall back to
//! row-by-row inserts when a chunk is rejected.

use crate::ingest::CandidateRow;
use crate::model::{NewStudent, Student};
use crate::store::RosterStore;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    pub chunk_size: usize,
    /// Pause between single-row inserts in a fallback.
    pub row_delay: Duration,
    /// Pause between chunks.
    pub chunk_delay: Duration,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            row_delay: Duration::from_millis(100),
            chunk_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedRow {
    pub placeholder_id: String,
    pub row_index: usize,
    pub student: Student,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub placeholder_id: String,
    pub row_index: usize,
    pub full_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkOutcome {
    /// 1-based.
    pub index: usize,
    pub size: usize,
    pub fell_back: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub created: Vec<CommittedRow>,
    pub failures: Vec<RowFailure>,
    pub chunks: Vec<ChunkOutcome>,
}

impl CommitReport {
    pub fn success_count(&self) -> usize {
        self.created.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Writes `rows` in order. Never stops early: every row ends up either in
/// `created` or in `failures`.
pub fn commit_rows<S: RosterStore + ?Sized>(
    store: &S,
    rows: &[CandidateRow],
    opts: &CommitOptions,
) -> CommitReport {
    let chunk_size = opts.chunk_size.max(1);
    let mut report = CommitReport::default();

    for (i, chunk) in rows.chunks(chunk_size).enumerate() {
        if i > 0 {
            pause(opts.chunk_delay);
        }
        let batch: Vec<NewStudent> = chunk.iter().map(|r| r.to_new_student()).collect();
        match store.insert_students(&batch) {
            Ok(students) => {
                report
                    .created
                    .extend(chunk.iter().zip(students).map(|(row, student)| CommittedRow {
                        placeholder_id: row.placeholder_id.clone(),
                        row_index: row.row_index,
                        student,
                    }));
                report.chunks.push(ChunkOutcome {
                    index: i + 1,
                    size: chunk.len(),
                    fell_back: false,
                });
            }
            Err(e) => {
                warn!(chunk = i + 1, size = chunk.len(), error = %e, "chunk insert failed; inserting rows one by one");
                for (j, (row, new_student)) in chunk.iter().zip(&batch).enumerate() {
                    if j > 0 {
                        pause(opts.row_delay);
                    }
                    match store.insert_student(new_student) {
                        Ok(student) => report.created.push(CommittedRow {
                            placeholder_id: row.placeholder_id.clone(),
                            row_index: row.row_index,
                            student,
                        }),
                        Err(e) => report.failures.push(RowFailure {
                            placeholder_id: row.placeholder_id.clone(),
                            row_index: row.row_index,
                            full_name: row.full_name.clone(),
                            error: e.to_string(),
                        }),
                    }
                }
                report.chunks.push(ChunkOutcome {
                    index: i + 1,
                    size: chunk.len(),
                    fell_back: true,
                });
            }
        }
    }

    info!(
        rows = rows.len(),
        created = report.success_count(),
        failed = report.failed_count(),
        chunks = report.chunks.len(),
        "import commit finished"
    );
    report
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}

/// Rows parsed from a spreadsheet and held for review until committed.
#[derive(Debug, Clone, Default)]
pub struct PendingImport {
    pub source: String,
    pub rows: Vec<CandidateRow>,
}

impl PendingImport {
    pub fn new(source: impl Into<String>, rows: Vec<CandidateRow>) -> Self {
        Self {
            source: source.into(),
            rows,
        }
    }

    /// Drops rows the store accepted so a retry only resubmits failures.
    /// Returns true when nothing is left pending.
    pub fn absorb(&mut self, report: &CommitReport) -> bool {
        let done: HashSet<&str> = report
            .created
            .iter()
            .map(|c| c.placeholder_id.as_str())
            .collect();
        self.rows.retain(|r| !done.contains(r.placeholder_id.as_str()));
        self.rows.is_empty()
    }

    pub fn find_mut(&mut self, placeholder_id: &str) -> Option<&mut CandidateRow> {
        self.rows
            .iter_mut()
            .find(|r| r.placeholder_id == placeholder_id)
    }

    pub fn remove(&mut self, placeholder_id: &str) -> Option<CandidateRow> {
        let pos = self
            .rows
            .iter()
            .position(|r| r.placeholder_id == placeholder_id)?;
        Some(self.rows.remove(pos))
    }
}
