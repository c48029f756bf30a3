use crate::calc;
use crate::ipc::helpers::{
    db_err, optional_month, optional_str, required_date, required_str, resolve_school_year,
    to_value, with_conn, HandlerErr, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceStatus;
use crate::store;
use rusqlite::Connection;
use serde_json::{json, Value};

fn require_student(conn: &Connection, params: &Value) -> Result<String, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    if store::get_student(conn, &student_id)
        .map_err(db_err("db_query_failed"))?
        .is_none()
    {
        return Err(HandlerErr::not_found("student", &student_id));
    }
    Ok(student_id)
}

fn attendance_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = require_student(conn, params)?;
    let year_id = resolve_school_year(conn, params)?;
    let month = optional_month(params, "month")?;
    let records = store::list_attendance(conn, &student_id, &year_id, month.as_deref())
        .map_err(db_err("db_query_failed"))?;
    Ok(json!({
        "schoolYearId": year_id,
        "month": month,
        "records": to_value(&records)?
    }))
}

fn attendance_set(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = require_student(conn, params)?;
    let year_id = resolve_school_year(conn, params)?;
    let date = required_date(params, "date")?;
    let status = match params.get("status") {
        None => return Err(HandlerErr::bad_params("missing status")),
        Some(Value::Null) => None,
        Some(Value::String(s)) => Some(AttendanceStatus::parse(s).ok_or_else(|| {
            HandlerErr::bad_params(format!("unknown attendance status: {}", s))
                .with_details(json!({ "allowed": ["present", "absent", "half", "sick", "holiday"] }))
        })?),
        Some(_) => return Err(HandlerErr::bad_params("status must be a string or null")),
    };
    let notes = optional_str(params, "notes")?;
    let record = store::set_attendance(
        conn,
        &student_id,
        &year_id,
        &date,
        status,
        notes.as_deref(),
    )
    .map_err(db_err("db_update_failed"))?;
    Ok(json!({ "record": to_value(&record)? }))
}

fn attendance_stats(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = require_student(conn, params)?;
    let year_id = resolve_school_year(conn, params)?;
    let month = optional_month(params, "month")?;
    let records = store::list_attendance(conn, &student_id, &year_id, None)
        .map_err(db_err("db_query_failed"))?;

    let stats = match month.as_deref() {
        Some(m) => {
            let in_month: Vec<_> = calc::filter_month(&records, m).into_iter().cloned().collect();
            calc::attendance_stats(&in_month)
        }
        None => calc::attendance_stats(&records),
    };
    let by_month = calc::attendance_by_month(&records);
    Ok(json!({
        "schoolYearId": year_id,
        "month": month,
        "stats": to_value(&stats)?,
        "byMonth": to_value(&by_month)?
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "attendance.list" => attendance_list,
        "attendance.set" => attendance_set,
        "attendance.stats" => attendance_stats,
        _ => return None,
    };
    Some(with_conn(state, req, op))
}
