use crate::ipc::helpers::{
    check_date, db_err, optional_f64, optional_str, patch_name, patch_nullable_str, patch_object,
    required_date, required_f64, required_str, to_value, with_conn, HandlerErr, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::{json, Value};

const DEFAULT_MAX_SCORE: f64 = 100.0;

fn grades_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let category_id = required_str(params, "categoryId")?;
    let grades = store::list_grades(conn, &category_id).map_err(db_err("db_query_failed"))?;
    let rows: Vec<Value> = grades
        .iter()
        .map(|g| -> Result<Value, HandlerErr> {
            let mut v = to_value(g)?;
            v["percent"] = json!(g.percent());
            Ok(v)
        })
        .collect::<Result<_, _>>()?;
    Ok(json!({ "grades": rows }))
}

fn grades_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let category_id = required_str(params, "categoryId")?;
    let date = required_date(params, "date")?;
    let score = required_f64(params, "score")?;
    let max_score = optional_f64(params, "maxScore")?.unwrap_or(DEFAULT_MAX_SCORE);
    store::validate_grade_numbers(score, max_score).map_err(HandlerErr::bad_params)?;
    let notes = optional_str(params, "notes")?.filter(|s| !s.is_empty());

    if store::get_category(conn, &category_id)
        .map_err(db_err("db_query_failed"))?
        .is_none()
    {
        return Err(HandlerErr::not_found("category", &category_id));
    }
    let grade = store::create_grade(conn, &category_id, &date, score, max_score, notes.as_deref())
        .map_err(db_err("db_insert_failed"))?;
    Ok(json!({ "grade": to_value(&grade)? }))
}

fn grades_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "gradeId")?;
    let patch = patch_object(params)?;
    let Some(mut grade) = store::get_grade(conn, &id).map_err(db_err("db_query_failed"))? else {
        return Err(HandlerErr::not_found("grade", &id));
    };
    if let Some(v) = patch_name(patch, "date")? {
        grade.date = check_date(&v, "date")?;
    }
    if let Some(v) = optional_f64(patch, "score")? {
        grade.score = v;
    }
    if let Some(v) = optional_f64(patch, "maxScore")? {
        grade.max_score = v;
    }
    if let Some(v) = patch_nullable_str(patch, "notes")? {
        grade.notes = v;
    }
    store::validate_grade_numbers(grade.score, grade.max_score).map_err(HandlerErr::bad_params)?;
    store::save_grade(conn, &grade).map_err(db_err("db_update_failed"))?;
    Ok(json!({ "grade": to_value(&grade)? }))
}

fn grades_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "gradeId")?;
    if !store::delete_grade(conn, &id).map_err(db_err("db_delete_failed"))? {
        return Err(HandlerErr::not_found("grade", &id));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "grades.list" => grades_list,
        "grades.create" => grades_create,
        "grades.update" => grades_update,
        "grades.delete" => grades_delete,
        _ => return None,
    };
    Some(with_conn(state, req, op))
}
