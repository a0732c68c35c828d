use crate::export::{absence_table, history_table, roster_table, write_table, ExportFormat, Table};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{date_range, required_class, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report::{build_class_report, build_history};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};

fn export_table(
    state: &AppState,
    params: &serde_json::Value,
    kind: &str,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_class(params, "classId")?;
    let out_path = PathBuf::from(required_str(params, "outPath")?);
    let format_raw = required_str(params, "format")?;
    let format = ExportFormat::parse(&format_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unsupported format: {}", format_raw)))?;
    let range = date_range(params)?;

    let table: Table = match kind {
        "roster" => roster_table(class_id, &state.roster.for_class(class_id)),
        "history" => history_table(&build_history(
            state.roster.all(),
            &state.attendance,
            class_id,
            &range,
        )),
        _ => absence_table(&build_class_report(
            state.roster.all(),
            &state.attendance,
            class_id,
            &range,
        )),
    };

    if let Err(e) = write_table(&table, format, &out_path) {
        error!(path = %out_path.display(), error = %format!("{e:#}"), "export failed");
        return Err(HandlerErr::new("export_failed", format!("{e:#}")));
    }
    info!(kind, path = %out_path.display(), rows = table.rows.len(), "export written");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "rows": table.rows.len(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let kind = match req.method.as_str() {
        "export.roster" => "roster",
        "export.history" => "history",
        "export.absences" => "absences",
        _ => return None,
    };
    Some(respond(&req.id, export_table(state, &req.params, kind)))
}
