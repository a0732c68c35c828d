use crate::classes;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{optional_class, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewStudent, Student};
use crate::roster;
use crate::store::RosterStore;
use serde_json::json;
use tracing::info;

fn validated(row: NewStudent) -> Result<NewStudent, HandlerErr> {
    let row = row.normalized();
    if row.full_name.is_empty() {
        return Err(HandlerErr::bad_params("fullName must not be empty"));
    }
    if !classes::is_known(&row.class_id) {
        return Err(HandlerErr::bad_params(format!("unknown classId: {}", row.class_id)));
    }
    Ok(row)
}

/// Overlays the fields present in `params` onto the stored record.
fn patched(current: &Student, params: &serde_json::Value) -> Result<NewStudent, HandlerErr> {
    let mut merged = serde_json::to_value(current)
        .map_err(|e| HandlerErr::new("server_error", e.to_string()))?;
    if let (Some(obj), Some(patch)) = (merged.as_object_mut(), params.as_object()) {
        for (k, v) in patch {
            if k != "studentId" {
                obj.insert(k.clone(), v.clone());
            }
        }
    }
    serde_json::from_value(merged).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

fn students_list(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let students = match optional_class(params, "classId")? {
        Some(class_id) => state.roster.for_class(class_id),
        None => state.roster.all().to_vec(),
    };
    Ok(json!({ "students": students }))
}

fn students_refresh(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let count = state.roster.refresh(store)?;
    Ok(json!({ "count": count }))
}

fn students_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let row: NewStudent = serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    let row = validated(row)?;
    match store.insert_student(&row) {
        Ok(student) => {
            info!(student_id = %student.id, class_id = %student.class_id, "student created");
            state.roster.upsert(student.clone());
            Ok(json!({ "student": student }))
        }
        Err(e) => Err(state.roster.reject(store, e, |_| {}).into()),
    }
}

fn students_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let student_id = required_str(params, "studentId")?;
    let previous = state
        .roster
        .get(&student_id)
        .cloned()
        .ok_or_else(|| HandlerErr::not_found("student not found"))?;
    let row = validated(patched(&previous, params)?)?;

    state.roster.upsert(Student {
        id: previous.id.clone(),
        roll_number: row.roll_number,
        full_name: row.full_name.clone(),
        class_id: row.class_id.clone(),
        age: row.age,
        phone: row.phone.clone(),
        alt_phone: row.alt_phone.clone(),
        created_at: previous.created_at.clone(),
    });
    match store.update_student(&student_id, &row) {
        Ok(saved) => {
            state.roster.upsert(saved.clone());
            Ok(json!({ "student": saved }))
        }
        Err(e) => Err(state.roster.reject(store, e, |c| c.upsert(previous)).into()),
    }
}

fn students_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let student_id = required_str(params, "studentId")?;
    if !roster::delete_student(&mut state.roster, &mut state.attendance, store, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    info!(student_id = %student_id, "student deleted");
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.refresh" => students_refresh(state),
        "students.create" => students_create(state, &req.params),
        "students.update" => students_update(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
