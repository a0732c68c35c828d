use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::error;

fn health(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
    }))
}

fn workspace_select(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(required_str(params, "path")?);
    if let Err(e) = state.select_workspace(path.clone()) {
        error!(error = %format!("{e:#}"), "workspace open failed");
        return Err(HandlerErr::new("db_open_failed", format!("{e:#}")));
    }
    let (students, entries) = state.reload()?;
    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "students": students,
        "attendanceEntries": entries,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => health(state),
        "workspace.select" => workspace_select(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
