use crate::commit::{commit_rows, PendingImport};
use crate::error::AppError;
use crate::ingest::{ingest_file, BlankRowPolicy, IngestOptions};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{optional_class, optional_u64, required_class, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

fn pending_json(pending: Option<&PendingImport>) -> serde_json::Value {
    match pending {
        Some(p) => json!({ "source": p.source, "rows": p.rows }),
        None => json!({ "source": null, "rows": [] }),
    }
}

fn optional_i64_field(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<Option<i64>>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(serde_json::Value::Null) => Ok(Some(None)),
        Some(v) => v
            .as_i64()
            .map(|n| Some(Some(n)))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

/// Absent → `None`; null or blank → `Some(None)`; anything but a string is refused.
fn optional_text_field(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<Option<String>>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(serde_json::Value::Null) => Ok(Some(None)),
        Some(serde_json::Value::String(s)) => {
            let t = s.trim();
            Ok(Some((!t.is_empty()).then(|| t.to_string())))
        }
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

fn import_preview(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let path = required_str(params, "path")?;
    let blank_rows = match params.get("blankRows") {
        None | Some(serde_json::Value::Null) => BlankRowPolicy::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|_| HandlerErr::bad_params("blankRows must be preserve or skipNameless"))?,
    };
    let opts = IngestOptions {
        pinned_class: optional_class(params, "classId")?,
        blank_rows,
    };

    let rows = ingest_file(Path::new(&path), &opts).map_err(|e| {
        warn!(path = %path, error = %e, "spreadsheet parse failed");
        AppError::from(e)
    })?;
    let flagged = rows.iter().filter(|r| !r.warnings.is_empty()).count();
    info!(path = %path, rows = rows.len(), flagged, "import preview ready");
    state.pending_import = Some(PendingImport::new(path, rows));
    let mut out = pending_json(state.pending_import.as_ref());
    out["flagged"] = json!(flagged);
    Ok(out)
}

fn import_edit_row(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let placeholder_id = required_str(params, "placeholderId")?;
    let class_id = match params.get("classId") {
        None => None,
        Some(_) => Some(required_class(params, "classId")?),
    };
    let roll_number = optional_i64_field(params, "rollNumber")?;
    let age = optional_i64_field(params, "age")?;
    let full_name = match params.get("fullName") {
        None => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| HandlerErr::bad_params("fullName must be a string"))?,
        ),
    };
    let phone = optional_text_field(params, "phone")?;
    let alt_phone = optional_text_field(params, "altPhone")?;

    let pending = state
        .pending_import
        .as_mut()
        .ok_or_else(|| HandlerErr::not_found("no pending import"))?;
    let row = pending
        .find_mut(&placeholder_id)
        .ok_or_else(|| HandlerErr::not_found("pending row not found"))?;

    if let Some(name) = full_name {
        row.set_full_name(name);
    }
    if let Some(id) = class_id {
        row.set_class(id);
    }
    if let Some(v) = roll_number {
        row.set_roll_number(v);
    }
    if let Some(v) = age {
        row.set_age(v);
    }
    if let Some(v) = phone {
        row.phone = v;
    }
    if let Some(v) = alt_phone {
        row.alt_phone = v;
    }
    Ok(json!({ "row": row }))
}

fn import_remove_row(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let placeholder_id = required_str(params, "placeholderId")?;
    let pending = state
        .pending_import
        .as_mut()
        .ok_or_else(|| HandlerErr::not_found("no pending import"))?;
    pending
        .remove(&placeholder_id)
        .ok_or_else(|| HandlerErr::not_found("pending row not found"))?;
    let remaining = pending.rows.len();
    if remaining == 0 {
        state.pending_import = None;
    }
    Ok(json!({ "remaining": remaining }))
}

/// Runs the chunked commit. Accepted rows leave the pending import; rejected
/// ones stay so they can be fixed and committed again.
fn import_commit(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let pending = state
        .pending_import
        .as_mut()
        .ok_or_else(|| HandlerErr::not_found("no pending import"))?;

    let mut opts = state.config.commit_options();
    if let Some(n) = optional_u64(params, "chunkSize")? {
        opts.chunk_size = (n as usize).max(1);
    }
    if let Some(ms) = optional_u64(params, "rowDelayMs")? {
        opts.row_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = optional_u64(params, "chunkDelayMs")? {
        opts.chunk_delay = Duration::from_millis(ms);
    }

    let report = commit_rows(store, &pending.rows, &opts);
    state
        .roster
        .merge(report.created.iter().map(|c| c.student.clone()));
    let done = pending.absorb(&report);
    let remaining = pending.rows.len();
    if done {
        state.pending_import = None;
    }

    Ok(json!({
        "successCount": report.success_count(),
        "failedCount": report.failed_count(),
        "failures": report.failures,
        "chunks": report.chunks,
        "created": report.created,
        "pendingRemaining": remaining,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "import.preview" => import_preview(state, &req.params),
        "import.pending" => Ok(pending_json(state.pending_import.as_ref())),
        "import.editRow" => import_edit_row(state, &req.params),
        "import.removeRow" => import_remove_row(state, &req.params),
        "import.discard" => {
            let discarded = state.pending_import.take().map_or(0, |p| p.rows.len());
            Ok(json!({ "discarded": discarded }))
        }
        "import.commit" => import_commit(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
