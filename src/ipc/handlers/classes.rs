use crate::classes::{self, DIRECTORY};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn classes_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let classes: Vec<serde_json::Value> = DIRECTORY
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "label": c.label,
                "description": c.description,
                "studentCount": state.roster.count_in_class(c.id),
            })
        })
        .collect();
    Ok(json!({ "classes": classes }))
}

fn classes_resolve(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let hint = params
        .get("hint")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing hint"))?;
    let m = classes::resolve_hint(hint);
    Ok(json!({
        "classId": m.class_id,
        "label": classes::label_of(m.class_id),
        "kind": m.kind,
        "guessed": m.kind.is_guess(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => classes_list(state),
        "classes.resolve" => classes_resolve(&req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
