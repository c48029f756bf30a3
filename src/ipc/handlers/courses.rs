use crate::config;
use crate::ipc::helpers::{
    db_err, optional_bool, optional_f64, optional_i64, optional_str, patch_name,
    patch_nullable_str, patch_object, required_f64, required_str, resolve_school_year, to_value,
    with_conn, HandlerErr, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Course;
use crate::store::{self, CategorySeed};
use rusqlite::Connection;
use serde_json::{json, Value};

fn check_credits(credits: f64) -> Result<f64, HandlerErr> {
    if credits < 0.0 {
        return Err(HandlerErr::bad_params("credits must be >= 0"));
    }
    Ok(credits)
}

fn parse_seeds(v: &Value) -> Result<Vec<CategorySeed>, HandlerErr> {
    let Some(items) = v.as_array() else {
        return Err(HandlerErr::bad_params("categories must be an array"));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<CategorySeed, HandlerErr> {
            let name = item
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    HandlerErr::bad_params(format!("categories[{}].name is required", i))
                })?;
            let weight = optional_f64(item, "weight")?.unwrap_or(0.0);
            Ok(CategorySeed {
                name: name.to_string(),
                weight,
            })
        })
        .collect()
}

fn courses_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let year_id = resolve_school_year(conn, params)?;
    let courses =
        store::list_courses(conn, &student_id, &year_id).map_err(db_err("db_query_failed"))?;
    Ok(json!({ "schoolYearId": year_id, "courses": to_value(&courses)? }))
}

fn courses_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let name = required_str(params, "name")?;
    if store::get_student(conn, &student_id)
        .map_err(db_err("db_query_failed"))?
        .is_none()
    {
        return Err(HandlerErr::not_found("student", &student_id));
    }
    let year_id = resolve_school_year(conn, params)?;
    let defaults = config::course_defaults(conn).map_err(db_err("db_query_failed"))?;

    let seeds = match params.get("categories") {
        Some(v) if !v.is_null() => parse_seeds(v)?,
        _ => defaults.categories,
    };
    let course = Course {
        id: store::new_course_id(),
        student_id,
        school_year_id: year_id,
        name,
        description: optional_str(params, "description")?.filter(|s| !s.is_empty()),
        credits: check_credits(optional_f64(params, "credits")?.unwrap_or(defaults.credits))?,
        color: Some(
            optional_str(params, "color")?
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.color),
        ),
        ignore_attendance_weight: optional_bool(params, "ignoreAttendanceWeight")?
            .unwrap_or(false),
    };
    let categories = store::create_course(conn, &course, &seeds).map_err(|e| {
        db_err("db_insert_failed")(e).with_details(json!({ "table": "courses" }))
    })?;
    tracing::debug!(course_id = %course.id, categories = categories.len(), "course created");
    Ok(json!({ "course": to_value(&course)?, "categories": to_value(&categories)? }))
}

fn courses_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "courseId")?;
    let patch = patch_object(params)?;
    let Some(mut course) = store::get_course(conn, &id).map_err(db_err("db_query_failed"))?
    else {
        return Err(HandlerErr::not_found("course", &id));
    };
    if let Some(v) = patch_name(patch, "name")? {
        course.name = v;
    }
    if let Some(v) = patch_nullable_str(patch, "description")? {
        course.description = v;
    }
    if let Some(v) = patch_nullable_str(patch, "color")? {
        course.color = v;
    }
    if let Some(v) = optional_f64(patch, "credits")? {
        course.credits = check_credits(v)?;
    }
    if let Some(v) = optional_bool(patch, "ignoreAttendanceWeight")? {
        course.ignore_attendance_weight = v;
    }
    store::save_course(conn, &course).map_err(db_err("db_update_failed"))?;
    Ok(json!({ "course": to_value(&course)? }))
}

fn courses_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "courseId")?;
    if !store::delete_course(conn, &id).map_err(db_err("db_delete_failed"))? {
        return Err(HandlerErr::not_found("course", &id));
    }
    Ok(json!({ "ok": true }))
}

fn categories_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let cats = store::list_categories(conn, &course_id).map_err(db_err("db_query_failed"))?;
    let weight_total: f64 = cats.iter().map(|c| c.weight).sum();
    Ok(json!({ "categories": to_value(&cats)?, "weightTotal": weight_total }))
}

fn categories_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let name = required_str(params, "name")?;
    let weight = required_f64(params, "weight")?;
    if store::get_course(conn, &course_id)
        .map_err(db_err("db_query_failed"))?
        .is_none()
    {
        return Err(HandlerErr::not_found("course", &course_id));
    }
    let cat = store::create_category(conn, &course_id, &name, weight)
        .map_err(db_err("db_insert_failed"))?;
    Ok(json!({ "category": to_value(&cat)? }))
}

fn categories_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "categoryId")?;
    let patch = patch_object(params)?;
    let Some(mut cat) = store::get_category(conn, &id).map_err(db_err("db_query_failed"))? else {
        return Err(HandlerErr::not_found("category", &id));
    };
    if let Some(v) = patch_name(patch, "name")? {
        cat.name = v;
    }
    if let Some(v) = optional_f64(patch, "weight")? {
        cat.weight = v;
    }
    if let Some(v) = optional_i64(patch, "sortOrder")? {
        cat.sort_order = v;
    }
    store::save_category(conn, &cat).map_err(db_err("db_update_failed"))?;
    Ok(json!({ "category": to_value(&cat)? }))
}

fn categories_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "categoryId")?;
    if !store::delete_category(conn, &id).map_err(db_err("db_delete_failed"))? {
        return Err(HandlerErr::not_found("category", &id));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "courses.list" => courses_list,
        "courses.create" => courses_create,
        "courses.update" => courses_update,
        "courses.delete" => courses_delete,
        "categories.list" => categories_list,
        "categories.create" => categories_create,
        "categories.update" => categories_update,
        "categories.delete" => categories_delete,
        _ => return None,
    };
    Some(with_conn(state, req, op))
}
