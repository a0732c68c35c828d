use crate::classes;
use crate::ipc::error::HandlerErr;
use crate::report::{normalize_date, DateRange};
use serde_json::Value;

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Missing, null and blank all read as `None`.
pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn optional_u64(params: &Value, key: &str) -> Result<Option<u64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key))),
    }
}

pub fn required_class(params: &Value, key: &str) -> Result<&'static str, HandlerErr> {
    let raw = required_str(params, key)?;
    known_class(&raw)
}

pub fn optional_class(params: &Value, key: &str) -> Result<Option<&'static str>, HandlerErr> {
    optional_str(params, key).map(|raw| known_class(&raw)).transpose()
}

fn known_class(raw: &str) -> Result<&'static str, HandlerErr> {
    classes::find(raw).map(|c| c.id).ok_or_else(|| {
        HandlerErr::not_found("class not found").with_details(serde_json::json!({ "classId": raw }))
    })
}

pub fn required_date(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let raw = required_str(params, key)?;
    normalize_date(&raw).map_err(HandlerErr::bad_params)
}

/// Reads optional `from` / `to`.
pub fn date_range(params: &Value) -> Result<DateRange, HandlerErr> {
    let parse = |key: &str| -> Result<Option<String>, HandlerErr> {
        optional_str(params, key)
            .map(|raw| normalize_date(&raw).map_err(HandlerErr::bad_params))
            .transpose()
    };
    let range = DateRange {
        from: parse("from")?,
        to: parse("to")?,
    };
    if let (Some(f), Some(t)) = (&range.from, &range.to) {
        if f > t {
            return Err(HandlerErr::bad_params("from must not be after to"));
        }
    }
    Ok(range)
}
