//! Roster, history and absence exports as spreadsheets or printable HTML.

use crate::classes;
use crate::ingest::COLUMN_HEADERS;
use crate::model::Student;
use crate::report::{ClassReport, HistoryGrid};
use anyhow::Context;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Html,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" => Some(ExportFormat::Xlsx),
            "csv" => Some(ExportFormat::Csv),
            "html" | "print" => Some(ExportFormat::Html),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    fn text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

impl From<Option<i64>> for Cell {
    fn from(v: Option<i64>) -> Self {
        v.map_or(Cell::Empty, |n| Cell::Number(n as f64))
    }
}

impl From<Option<&str>> for Cell {
    fn from(v: Option<&str>) -> Self {
        v.map_or(Cell::Empty, |s| Cell::Text(s.to_string()))
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

/// One sheet worth of output.
#[derive(Debug, Clone)]
pub struct Table {
    pub title: String,
    /// Key/value lines shown above the header in spreadsheet and print output.
    pub summary: Vec<(String, String)>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Same column layout as the import sheet so the file can be re-imported.
pub fn roster_table(class_id: &str, students: &[Student]) -> Table {
    let label = classes::label_of(class_id);
    Table {
        title: format!("{label} roster"),
        summary: Vec::new(),
        headers: COLUMN_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows: students
            .iter()
            .map(|s| {
                vec![
                    Cell::from(s.roll_number),
                    Cell::from(s.full_name.as_str()),
                    Cell::from(label),
                    Cell::from(s.age),
                    Cell::from(s.phone.as_deref()),
                    Cell::from(s.alt_phone.as_deref()),
                ]
            })
            .collect(),
    }
}

pub fn history_table(grid: &HistoryGrid) -> Table {
    let mut headers = vec!["Roll".to_string(), "Name".to_string()];
    headers.extend(grid.dates.iter().cloned());
    Table {
        title: format!("{} attendance history", classes::label_of(&grid.class_id)),
        summary: range_summary(grid.range.from.as_deref(), grid.range.to.as_deref()),
        headers,
        rows: grid
            .rows
            .iter()
            .map(|r| {
                let mut row = vec![Cell::from(r.roll_number), Cell::from(r.full_name.as_str())];
                row.extend(
                    r.statuses
                        .iter()
                        .map(|s| s.map_or(Cell::Empty, |s| Cell::Text(s.code().to_string()))),
                );
                row
            })
            .collect(),
    }
}

pub fn absence_table(report: &ClassReport) -> Table {
    let mut summary = range_summary(report.range.from.as_deref(), report.range.to.as_deref());
    summary.extend([
        ("Students".to_string(), report.roster_size.to_string()),
        ("Sessions".to_string(), report.session_dates.to_string()),
        (
            "Present".to_string(),
            format!("{} ({}%)", report.counts.present, report.percentages.present),
        ),
        (
            "Permission".to_string(),
            format!("{} ({}%)", report.counts.permission, report.percentages.permission),
        ),
        (
            "Absent".to_string(),
            format!("{} ({}%)", report.counts.absent, report.percentages.absent),
        ),
    ]);
    Table {
        title: format!("{} absence report", classes::label_of(&report.class_id)),
        summary,
        headers: vec![
            "Roll".to_string(),
            "Name".to_string(),
            "Days absent".to_string(),
            "Dates".to_string(),
        ],
        rows: report
            .absentees
            .iter()
            .map(|a| {
                vec![
                    Cell::from(a.roll_number),
                    Cell::from(a.full_name.as_str()),
                    Cell::Number(a.dates.len() as f64),
                    Cell::Text(a.dates.join(", ")),
                ]
            })
            .collect(),
    }
}

fn range_summary(from: Option<&str>, to: Option<&str>) -> Vec<(String, String)> {
    vec![(
        "Period".to_string(),
        format!("{} to {}", from.unwrap_or("start"), to.unwrap_or("today")),
    )]
}

pub fn write_table(table: &Table, format: ExportFormat, out_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    match format {
        ExportFormat::Xlsx => write_xlsx(table, out_path),
        ExportFormat::Csv => write_csv(table, out_path),
        ExportFormat::Html => std::fs::write(out_path, render_html(table)).with_context(|| {
            format!("failed to write {}", out_path.to_string_lossy())
        }),
    }
}

fn write_xlsx(table: &Table, out_path: &Path) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let title_fmt = Format::new().set_bold().set_font_size(14);
    let header_fmt = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center);
    let cell_fmt = Format::new().set_border(FormatBorder::Thin);

    // Without a summary the header lands in row 0, which keeps roster exports importable.
    let mut row: u32 = 0;
    if !table.summary.is_empty() {
        sheet.write_string_with_format(row, 0, &table.title, &title_fmt)?;
        row += 1;
        for (k, v) in &table.summary {
            sheet.write_string(row, 0, k)?;
            sheet.write_string(row, 1, v)?;
            row += 1;
        }
        row += 1;
    }

    for (c, h) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(row, c as u16, h, &header_fmt)?;
    }
    row += 1;
    for cells in &table.rows {
        for (c, cell) in cells.iter().enumerate() {
            let col = c as u16;
            match cell {
                Cell::Text(s) => {
                    sheet.write_string_with_format(row, col, s, &cell_fmt)?;
                }
                Cell::Number(n) => {
                    sheet.write_number_with_format(row, col, *n, &cell_fmt)?;
                }
                Cell::Empty => {
                    sheet.write_blank(row, col, &cell_fmt)?;
                }
            }
        }
        row += 1;
    }
    sheet.set_column_width(1, 28)?;

    workbook
        .save(out_path)
        .with_context(|| format!("failed to save {}", out_path.to_string_lossy()))?;
    Ok(())
}

fn write_csv(table: &Table, out_path: &Path) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(out_path)
        .with_context(|| format!("failed to create {}", out_path.to_string_lossy()))?;
    wtr.write_record(&table.headers)?;
    for cells in &table.rows {
        wtr.write_record(cells.iter().map(Cell::text))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn render_html(table: &Table) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    out.push_str(&format!("<title>{}</title>", escape(&table.title)));
    out.push_str(
        "<style>body{font-family:sans-serif}table{border-collapse:collapse}\
         td,th{border:1px solid #444;padding:2px 6px}@media print{button{display:none}}</style>",
    );
    out.push_str("</head><body>\n");
    out.push_str(&format!("<h1>{}</h1>\n", escape(&table.title)));
    if !table.summary.is_empty() {
        out.push_str("<dl>");
        for (k, v) in &table.summary {
            out.push_str(&format!("<dt>{}</dt><dd>{}</dd>", escape(k), escape(v)));
        }
        out.push_str("</dl>\n");
    }
    out.push_str("<table>\n<tr>");
    for h in &table.headers {
        out.push_str(&format!("<th>{}</th>", escape(h)));
    }
    out.push_str("</tr>\n");
    for cells in &table.rows {
        out.push_str("<tr>");
        for c in cells {
            out.push_str(&format!("<td>{}</td>", escape(&c.text())));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n</body></html>\n");
    out
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
