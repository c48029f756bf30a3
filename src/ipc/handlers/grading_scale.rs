use crate::db;
use crate::ipc::helpers::{db_err, with_conn, HandlerErr, Op};
use crate::ipc::types::{AppState, Request};
use crate::model::GradingScaleRow;
use crate::scale::{self, GradingScale};
use crate::store;
use rusqlite::Connection;
use serde_json::{json, Value};

fn scale_view(scale: &GradingScale) -> Value {
    json!({
        "rows": scale.rows(),
        "kind": scale.kind(),
        "isSimple": scale.is_simple()
    })
}

fn replace(conn: &Connection, next: GradingScale) -> Result<Value, HandlerErr> {
    db::replace_grading_scale(conn, &next).map_err(db_err("db_update_failed"))?;
    // Reload so generated row ids are returned.
    let stored = store::load_grading_scale(conn).map_err(db_err("db_query_failed"))?;
    tracing::info!(kind = ?stored.kind(), rows = stored.rows().len(), "grading scale replaced");
    Ok(scale_view(&stored))
}

fn scale_get(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let current = store::load_grading_scale(conn).map_err(db_err("db_query_failed"))?;
    Ok(scale_view(&current))
}

fn scale_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let Some(raw) = params.get("rows") else {
        return Err(HandlerErr::bad_params("missing rows"));
    };
    let rows: Vec<GradingScaleRow> = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("rows: {}", e)))?;
    scale::validate_rows(&rows).map_err(HandlerErr::bad_params)?;
    // Ids are reassigned on every replace.
    let rows = rows
        .into_iter()
        .map(|r| GradingScaleRow { id: None, ..r })
        .collect();
    replace(conn, GradingScale::new(rows))
}

fn scale_toggle(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let current = store::load_grading_scale(conn).map_err(db_err("db_query_failed"))?;
    replace(conn, current.toggled())
}

fn scale_reset(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    replace(conn, GradingScale::simple())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "scale.get" => scale_get,
        "scale.update" => scale_update,
        "scale.toggle" => scale_toggle,
        "scale.reset" => scale_reset,
        _ => return None,
    };
    Some(with_conn(state, req, op))
}
