use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{date_range, required_class};
use crate::ipc::types::{AppState, Request};
use crate::report::build_class_report;

fn reports_class(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_class(params, "classId")?;
    let range = date_range(params)?;
    let report = build_class_report(state.roster.all(), &state.attendance, class_id, &range);
    serde_json::to_value(report).map_err(|e| HandlerErr::new("server_error", e.to_string()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.class" => reports_class(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
