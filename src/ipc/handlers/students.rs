use crate::ipc::helpers::{
    db_err, optional_date, optional_str, patch_name, patch_nullable_str, patch_object,
    required_str, to_value, with_conn, HandlerErr, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::{json, Value};

fn students_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let students = store::list_students(conn).map_err(db_err("db_query_failed"))?;
    let rows: Vec<Value> = students
        .iter()
        .map(|s| -> Result<Value, HandlerErr> {
            let mut v = to_value(s)?;
            v["displayName"] = json!(s.display_name());
            Ok(v)
        })
        .collect::<Result<_, _>>()?;
    Ok(json!({ "students": rows }))
}

fn students_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "studentId")?;
    match store::get_student(conn, &id).map_err(db_err("db_query_failed"))? {
        Some(s) => Ok(json!({ "student": to_value(&s)? })),
        None => Err(HandlerErr::not_found("student", &id)),
    }
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let first_name = required_str(params, "firstName")?;
    let last_name = required_str(params, "lastName")?;
    let grade_level = optional_str(params, "gradeLevel")?.filter(|s| !s.is_empty());
    let birth_date = optional_date(params, "birthDate")?;
    let student = store::create_student(
        conn,
        &first_name,
        &last_name,
        grade_level.as_deref(),
        birth_date.as_deref(),
    )
    .map_err(|e| {
        db_err("db_insert_failed")(e).with_details(json!({ "table": "students" }))
    })?;
    Ok(json!({ "student": to_value(&student)? }))
}

fn students_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "studentId")?;
    let patch = patch_object(params)?;
    let Some(mut student) = store::get_student(conn, &id).map_err(db_err("db_query_failed"))?
    else {
        return Err(HandlerErr::not_found("student", &id));
    };

    if let Some(v) = patch_name(patch, "firstName")? {
        student.first_name = v;
    }
    if let Some(v) = patch_name(patch, "lastName")? {
        student.last_name = v;
    }
    if let Some(v) = patch_nullable_str(patch, "gradeLevel")? {
        student.grade_level = v;
    }
    if patch.get("birthDate").is_some() {
        student.birth_date = optional_date(patch, "birthDate")?;
    }

    let saved = store::save_student(conn, &student).map_err(db_err("db_update_failed"))?;
    Ok(json!({ "student": to_value(&saved)? }))
}

fn students_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "studentId")?;
    if !store::delete_student(conn, &id).map_err(db_err("db_delete_failed"))? {
        return Err(HandlerErr::not_found("student", &id));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "students.list" => students_list,
        "students.get" => students_get,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        _ => return None,
    };
    Some(with_conn(state, req, op))
}
