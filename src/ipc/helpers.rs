use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self {
            code: "not_found",
            message: format!("{} not found", what),
            details: Some(json!({ "id": id })),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

/// Maps a storage error onto `code`, e.g. `.map_err(db_err("db_query_failed"))`.
pub fn db_err(code: &'static str) -> impl Fn(anyhow::Error) -> HandlerErr {
    move |e| HandlerErr::new(code, format!("{:#}", e))
}

pub type Op = fn(&Connection, &Value) -> Result<Value, HandlerErr>;

/// Runs `op` against the open workspace and wraps the outcome in an envelope.
pub fn with_conn(state: &AppState, req: &Request, op: Op) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match op(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

/// Absent keys leave a field alone; `null` clears it.
pub fn patch_nullable_str(params: &Value, key: &str) -> Result<Option<Option<String>>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok(Some(if t.is_empty() { None } else { Some(t.to_string()) }))
        }
        Some(_) => Err(HandlerErr::bad_params(format!(
            "{} must be a string or null",
            key
        ))),
    }
}

pub fn patch_name(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) => {
            let s = v
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    HandlerErr::bad_params(format!("{} must be a non-empty string", key))
                })?;
            Ok(Some(s.to_string()))
        }
    }
}

pub fn optional_f64(params: &Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

pub fn required_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    optional_f64(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

pub fn optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn patch_object(params: &Value) -> Result<&Value, HandlerErr> {
    match params.get("patch") {
        Some(p) if p.is_object() => Ok(p),
        _ => Err(HandlerErr::bad_params("patch must be an object")),
    }
}

/// Checks a `YYYY-MM-DD` calendar date and returns it normalized.
pub fn check_date(value: &str, key: &str) -> Result<String, HandlerErr> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be a YYYY-MM-DD date", key)))
}

pub fn required_date(params: &Value, key: &str) -> Result<String, HandlerErr> {
    check_date(&required_str(params, key)?, key)
}

pub fn optional_date(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match optional_str(params, key)? {
        Some(s) if !s.is_empty() => check_date(&s, key).map(Some),
        _ => Ok(None),
    }
}

/// Checks a `YYYY-MM` month filter.
pub fn optional_month(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    let Some(raw) = optional_str(params, key)? else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
        .map(|d| Some(d.format("%Y-%m").to_string()))
        .map_err(|_| HandlerErr::bad_params(format!("{} must be a YYYY-MM month", key)))
}

/// `schoolYearId` when given (must exist), otherwise the active year.
pub fn resolve_school_year(conn: &Connection, params: &Value) -> Result<String, HandlerErr> {
    if let Some(id) = optional_str(params, "schoolYearId")?.filter(|s| !s.is_empty()) {
        return match store::get_school_year(conn, &id).map_err(db_err("db_query_failed"))? {
            Some(y) => Ok(y.id),
            None => Err(HandlerErr::not_found("school year", &id)),
        };
    }
    store::get_active_school_year(conn)
        .map_err(db_err("db_query_failed"))?
        .map(|y| y.id)
        .ok_or_else(|| HandlerErr::new("not_found", "no active school year"))
}

pub fn to_value<T: serde::Serialize>(v: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(v).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_calendar_checked() {
        assert_eq!(check_date("2024-09-03", "date").ok().as_deref(), Some("2024-09-03"));
        assert!(check_date("2024-02-30", "date").is_err());
        assert!(check_date("09/03/2024", "date").is_err());
    }

    #[test]
    fn month_filter_is_checked() {
        let p = json!({ "month": "2024-09" });
        assert_eq!(optional_month(&p, "month").ok().flatten().as_deref(), Some("2024-09"));
        let p = json!({ "month": "2024-13" });
        assert!(optional_month(&p, "month").is_err());
        assert!(optional_month(&json!({}), "month").ok().flatten().is_none());
    }

    #[test]
    fn nullable_patch_distinguishes_absent_from_null() {
        let p = json!({ "color": null, "description": " x " });
        assert!(patch_nullable_str(&p, "missing").ok().flatten().is_none());
        assert_eq!(patch_nullable_str(&p, "color").ok().flatten(), Some(None));
        assert_eq!(
            patch_nullable_str(&p, "description").ok().flatten(),
            Some(Some("x".to_string()))
        );
        assert!(patch_nullable_str(&json!({ "color": 3 }), "color").is_err());
    }
}
