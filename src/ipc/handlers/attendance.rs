use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{date_range, optional_class, required_class, required_date, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRow, AttendanceStatus};
use crate::report::build_history;
use serde_json::json;
use std::collections::HashSet;

fn parse_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    required_str(params, "status")?
        .parse::<AttendanceStatus>()
        .map_err(HandlerErr::bad_params)
}

fn attendance_get(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = optional_class(params, "classId")?;
    let range = date_range(params)?;
    let mut entries = Vec::new();
    for s in state.roster.all() {
        if class_id.is_some_and(|c| c != s.class_id) {
            continue;
        }
        let Some(days) = state.attendance.days(&s.id) else {
            continue;
        };
        for (date, status) in days.iter().filter(|(d, _)| range.contains(d)) {
            entries.push(json!({
                "studentId": s.id,
                "classId": s.class_id,
                "date": date,
                "status": status,
            }));
        }
    }
    Ok(json!({ "entries": entries }))
}

fn attendance_refresh(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let entries = state.attendance.refresh(store)?;
    Ok(json!({ "entries": entries }))
}

fn attendance_mark(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let student_id = required_str(params, "studentId")?;
    let date = required_date(params, "date")?;
    let status = parse_status(params)?;
    let class_id = state
        .roster
        .get(&student_id)
        .map(|s| s.class_id.clone())
        .ok_or_else(|| HandlerErr::not_found("student not found"))?;

    let row = AttendanceRow {
        student_id,
        class_id,
        date,
        status,
    };
    state.attendance.mark(store, vec![row.clone()])?;
    Ok(json!({ "entry": row }))
}

fn attendance_clear(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let student_id = required_str(params, "studentId")?;
    let date = required_date(params, "date")?;
    if state.roster.get(&student_id).is_none() {
        return Err(HandlerErr::not_found("student not found"));
    }
    let had = state.attendance.get(&student_id, &date).is_some();
    state.attendance.clear(store, &student_id, &date)?;
    Ok(json!({ "cleared": had }))
}

/// Stamps one day for a whole class, or for the listed members of it.
fn attendance_bulk_mark(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let class_id = required_class(params, "classId")?;
    let date = required_date(params, "date")?;
    let status = parse_status(params)?;
    let wanted: Option<HashSet<&str>> = match params.get("studentIds") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Array(ids)) => Some(ids.iter().filter_map(|v| v.as_str()).collect()),
        Some(_) => return Err(HandlerErr::bad_params("studentIds must be an array")),
    };

    let members = state.roster.for_class(class_id);
    let rows: Vec<AttendanceRow> = members
        .iter()
        .filter(|s| wanted.as_ref().map_or(true, |w| w.contains(s.id.as_str())))
        .map(|s| AttendanceRow {
            student_id: s.id.clone(),
            class_id: class_id.to_string(),
            date: date.clone(),
            status,
        })
        .collect();
    let skipped = wanted.map_or(0, |w| w.len().saturating_sub(rows.len()));
    let marked = rows.len();
    if marked > 0 {
        state.attendance.mark(store, rows)?;
    }
    Ok(json!({ "marked": marked, "skipped": skipped }))
}

fn attendance_history(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_class(params, "classId")?;
    let range = date_range(params)?;
    let grid = build_history(state.roster.all(), &state.attendance, class_id, &range);
    serde_json::to_value(grid).map_err(|e| HandlerErr::new("server_error", e.to_string()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.get" => attendance_get(state, &req.params),
        "attendance.refresh" => attendance_refresh(state),
        "attendance.mark" => attendance_mark(state, &req.params),
        "attendance.clear" => attendance_clear(state, &req.params),
        "attendance.bulkMark" => attendance_bulk_mark(state, &req.params),
        "attendance.history" => attendance_history(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
