//! Spreadsheet ingestion: file → rectangular text grid → candidate students.

use crate::classes::{self, ClassMatch};
use crate::model::NewStudent;
use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Positional layout of an import sheet. Exports write the same layout.
pub const COLUMN_HEADERS: [&str; 6] = ["Roll", "Name", "Class", "Age", "Phone", "Alt Phone"];

const COL_ROLL: usize = 0;
const COL_NAME: usize = 1;
const COL_CLASS: usize = 2;
const COL_AGE: usize = 3;
const COL_PHONE: usize = 4;
const COL_ALT_PHONE: usize = 5;
const EMPTY_NAME: &str = "name is empty";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook has no sheets")]
    NoSheet,

    #[error("unsupported file type: {0} (expected .xlsx, .xls, .ods or .csv)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlankRowPolicy {
    /// Every data row becomes a candidate, blank ones included.
    #[default]
    Preserve,
    /// Rows with an empty name cell are dropped.
    SkipNameless,
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub pinned_class: Option<&'static str>,
    pub blank_rows: BlankRowPolicy,
}

/// A parsed sheet row awaiting review and commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRow {
    pub placeholder_id: String,
    /// 1-based position among data rows (header excluded).
    pub row_index: usize,
    pub roll_number: Option<i64>,
    pub full_name: String,
    pub class_hint: String,
    pub class_match: ClassMatch,
    pub age: Option<i64>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub warnings: Vec<String>,
}

impl CandidateRow {
    pub fn class_id(&self) -> &'static str {
        self.class_match.class_id
    }

    /// Manual fix before commit; keeps the empty-name warning in step.
    pub fn set_full_name(&mut self, name: &str) {
        self.full_name = name.trim().to_string();
        self.warnings.retain(|w| w != EMPTY_NAME);
        if self.full_name.is_empty() {
            self.warnings.push(EMPTY_NAME.to_string());
        }
    }

    pub fn set_class(&mut self, class_id: &'static str) {
        self.class_match = classes::pinned(class_id);
        self.warnings.retain(|w| !w.starts_with("class "));
    }

    pub fn set_roll_number(&mut self, roll_number: Option<i64>) {
        self.roll_number = roll_number;
        self.warnings.retain(|w| !w.starts_with("roll number "));
    }

    pub fn set_age(&mut self, age: Option<i64>) {
        self.age = age;
        self.warnings.retain(|w| !w.starts_with("age "));
    }

    pub fn to_new_student(&self) -> NewStudent {
        NewStudent {
            roll_number: self.roll_number,
            full_name: self.full_name.clone(),
            class_id: self.class_id().to_string(),
            age: self.age,
            phone: self.phone.clone(),
            alt_phone: self.alt_phone.clone(),
        }
    }
}

/// Reads the first sheet of `path` as text cells. Header row included.
pub fn read_grid(path: &Path) -> Result<Vec<Vec<String>>, IngestError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => read_csv_grid(path),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook_grid(path),
        _ => Err(IngestError::UnsupportedFormat(
            path.to_string_lossy().to_string(),
        )),
    }
}

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<String>>, IngestError> {
    let data = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_slice());
    let mut grid: Vec<Vec<String>> = Vec::new();
    let mut record = csv::StringRecord::new();
    while rdr.read_record(&mut record)? {
        // The reader skips empty lines; put them back so row indices match the sheet.
        if !grid.is_empty() {
            let from = record.position().map_or(0, |p| p.byte() as usize);
            for _ in 0..skipped_lines(&data, from) {
                grid.push(Vec::new());
            }
        }
        grid.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(grid)
}

/// Empty lines between `from` (where the reader resumed) and the next record.
fn skipped_lines(data: &[u8], from: usize) -> usize {
    let mut i = from;
    // The previous record may have stopped between CR and LF.
    if i > 0 && data.get(i - 1) == Some(&b'\r') && data.get(i) == Some(&b'\n') {
        i += 1;
    }
    let mut count = 0;
    while let Some(&b) = data.get(i) {
        match b {
            b'\r' if data.get(i + 1) == Some(&b'\n') => i += 2,
            b'\r' | b'\n' => i += 1,
            _ => break,
        }
        count += 1;
    }
    count
}

fn read_workbook_grid(path: &Path) -> Result<Vec<Vec<String>>, IngestError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(IngestError::NoSheet)??;
    // calamine trims leading empty columns; put them back so positions hold.
    let lead = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    let grid = range
        .rows()
        .map(|row| {
            std::iter::repeat(String::new())
                .take(lead)
                .chain(row.iter().map(cell_text))
                .collect()
        })
        .collect();
    Ok(grid)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Spreadsheets store integers as floats; "12" not "12.0".
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Pads every row to the widest row, and to at least the mapped column count.
pub fn normalize_grid(grid: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = grid
        .iter()
        .map(|r| r.len())
        .max()
        .unwrap_or(0)
        .max(COLUMN_HEADERS.len());
    grid.into_iter()
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect()
}

/// Maps a normalized grid (header first) to candidate rows.
pub fn candidates_from_grid(grid: &[Vec<String>], opts: &IngestOptions) -> Vec<CandidateRow> {
    grid.iter()
        .skip(1)
        .enumerate()
        .filter_map(|(i, row)| {
            let full_name = row[COL_NAME].trim().to_string();
            if opts.blank_rows == BlankRowPolicy::SkipNameless && full_name.is_empty() {
                return None;
            }
            let mut warnings = Vec::new();
            let roll_number = numeric_cell(&row[COL_ROLL], "roll number", &mut warnings);
            let age = numeric_cell(&row[COL_AGE], "age", &mut warnings);
            let class_hint = row[COL_CLASS].trim().to_string();
            let class_match = match opts.pinned_class {
                Some(id) => classes::pinned(id),
                None => classes::resolve_hint(&class_hint),
            };
            if class_match.kind.is_guess() {
                warnings.push(format!(
                    "class {:?} guessed as {}",
                    class_hint,
                    classes::label_of(class_match.class_id)
                ));
            }
            if full_name.is_empty() {
                warnings.push(EMPTY_NAME.to_string());
            }
            Some(CandidateRow {
                placeholder_id: Uuid::new_v4().to_string(),
                row_index: i + 1,
                roll_number,
                full_name,
                class_hint,
                class_match,
                age,
                phone: text_cell(&row[COL_PHONE]),
                alt_phone: text_cell(&row[COL_ALT_PHONE]),
                warnings,
            })
        })
        .collect()
}

/// Whole pipeline for one file. Any read failure aborts with no rows.
pub fn ingest_file(path: &Path, opts: &IngestOptions) -> Result<Vec<CandidateRow>, IngestError> {
    let grid = normalize_grid(read_grid(path)?);
    Ok(candidates_from_grid(&grid, opts))
}

fn numeric_cell(raw: &str, field: &str, warnings: &mut Vec<String>) -> Option<i64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(v) = t.parse::<i64>() {
        return Some(v);
    }
    match t.parse::<f64>() {
        // i64::MAX as f64 rounds up to 2^63, hence the strict bound.
        Ok(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Some(f as i64)
        }
        _ => {
            warnings.push(format!("{field} {t:?} is not a whole number"));
            None
        }
    }
}

fn text_cell(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}
