use crate::ipc::helpers::{
    check_date, db_err, optional_bool, patch_name, patch_object, required_date, required_str,
    to_value, with_conn, HandlerErr, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::{json, Value};

fn check_range(start: &str, end: &str) -> Result<(), HandlerErr> {
    // Both are normalized YYYY-MM-DD, so string order is date order.
    if start > end {
        return Err(HandlerErr::bad_params("startDate must not be after endDate"));
    }
    Ok(())
}

fn school_years_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let years = store::list_school_years(conn).map_err(db_err("db_query_failed"))?;
    Ok(json!({ "schoolYears": to_value(&years)? }))
}

fn school_years_get_active(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let year = store::get_active_school_year(conn).map_err(db_err("db_query_failed"))?;
    Ok(json!({ "schoolYear": to_value(&year)? }))
}

fn school_years_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let start = required_date(params, "startDate")?;
    let end = required_date(params, "endDate")?;
    check_range(&start, &end)?;
    let is_active = optional_bool(params, "isActive")?.unwrap_or(false);
    let year = store::create_school_year(conn, &name, &start, &end, is_active)
        .map_err(db_err("db_insert_failed"))?;
    Ok(json!({ "schoolYear": to_value(&year)? }))
}

fn school_years_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "schoolYearId")?;
    let patch = patch_object(params)?;
    let Some(mut year) = store::get_school_year(conn, &id).map_err(db_err("db_query_failed"))?
    else {
        return Err(HandlerErr::not_found("school year", &id));
    };
    if let Some(v) = patch_name(patch, "name")? {
        year.name = v;
    }
    if let Some(v) = patch_name(patch, "startDate")? {
        year.start_date = check_date(&v, "startDate")?;
    }
    if let Some(v) = patch_name(patch, "endDate")? {
        year.end_date = check_date(&v, "endDate")?;
    }
    check_range(&year.start_date, &year.end_date)?;
    let activate = optional_bool(patch, "isActive")?;
    if activate == Some(false) && year.is_active {
        return Err(HandlerErr::bad_params(
            "activate another school year instead of deactivating this one",
        ));
    }

    store::save_school_year(conn, &year).map_err(db_err("db_update_failed"))?;
    if activate == Some(true) {
        store::set_active_school_year(conn, &id).map_err(db_err("db_update_failed"))?;
    }
    let saved = store::get_school_year(conn, &id)
        .map_err(db_err("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("school year", &id))?;
    Ok(json!({ "schoolYear": to_value(&saved)? }))
}

fn school_years_set_active(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "schoolYearId")?;
    if !store::set_active_school_year(conn, &id).map_err(db_err("db_update_failed"))? {
        return Err(HandlerErr::not_found("school year", &id));
    }
    Ok(json!({ "ok": true, "activeSchoolYearId": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "schoolYears.list" => school_years_list,
        "schoolYears.getActive" => school_years_get_active,
        "schoolYears.create" => school_years_create,
        "schoolYears.update" => school_years_update,
        "schoolYears.setActive" => school_years_set_active,
        _ => return None,
    };
    Some(with_conn(state, req, op))
}
