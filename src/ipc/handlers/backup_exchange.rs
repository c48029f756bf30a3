use crate::backup;
use crate::exchange;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_err, optional_str, with_conn, HandlerErr, Op};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;

fn exchange_export_json(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let text = exchange::export_json(conn).map_err(db_err("db_query_failed"))?;
    let Some(out_path) = optional_str(params, "outPath")?.filter(|s| !s.is_empty()) else {
        return Ok(json!({ "format": exchange::SNAPSHOT_FORMAT_V1, "json": text }));
    };
    let out = PathBuf::from(&out_path);
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": out_path }))
        })?;
    }
    std::fs::write(&out, text.as_bytes()).map_err(|e| {
        HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": out_path }))
    })?;
    tracing::info!(path = %out_path, bytes = text.len(), "snapshot exported");
    Ok(json!({ "format": exchange::SNAPSHOT_FORMAT_V1, "path": out_path }))
}

fn exchange_import_json(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let text = match (params.get("json"), optional_str(params, "inPath")?) {
        (Some(Value::String(s)), _) => s.clone(),
        // Accept an already-parsed snapshot object as well.
        (Some(v @ Value::Object(_)), _) => v.to_string(),
        (_, Some(path)) if !path.is_empty() => std::fs::read_to_string(&path).map_err(|e| {
            HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": path }))
        })?,
        _ => return Err(HandlerErr::bad_params("missing json or inPath")),
    };
    let snapshot =
        exchange::parse_snapshot(&text).map_err(|e| HandlerErr::bad_params(format!("{:#}", e)))?;
    let summary = exchange::import_snapshot(conn, &snapshot)
        .map_err(|e| HandlerErr::new("db_tx_failed", format!("{:#}", e)))?;
    tracing::info!(?summary, "snapshot imported");
    Ok(json!({ "ok": true, "imported": summary }))
}

fn exchange_clear_all(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    exchange::clear_all(conn).map_err(db_err("db_delete_failed"))?;
    tracing::info!("workspace data cleared");
    Ok(json!({ "ok": true }))
}

fn param_path(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> Value {
    let Some(out_path) = param_path(req, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };
    let workspace_path = param_path(req, "workspacePath")
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone());
    let Some(workspace_path) = workspace_path else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            )
        }
    };
    tracing::info!(path = %out_path, sha256 = %export.db_sha256, "workspace bundle exported");

    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "dbSha256": export.db_sha256
        }),
    )
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> Value {
    let Some(in_path) = param_path(req, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };
    let workspace_path = param_path(req, "workspacePath")
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone());
    let Some(workspace_path) = workspace_path else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    let reopen_current = state.workspace.as_deref() == Some(workspace_path.as_path());
    // Drop open handle before replacing file.
    if reopen_current {
        state.db = None;
    }

    let import = backup::import_workspace_bundle(&src, &workspace_path);
    // The current workspace is reopened even after a failed import.
    if import.is_ok() || reopen_current {
        if let Err(e) = state.open_workspace(&workspace_path) {
            return err(
                &req.id,
                "db_open_failed",
                format!("{e:#}"),
                Some(json!({ "path": workspace_path.to_string_lossy() })),
            );
        }
    }
    let import = match import {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": in_path })),
            )
        }
    };
    tracing::info!(
        path = %in_path,
        format = %import.bundle_format_detected,
        checksum_verified = import.checksum_verified,
        "workspace bundle imported"
    );

    ok(
        &req.id,
        json!({
            "ok": true,
            "workspacePath": workspace_path.to_string_lossy(),
            "bundleFormatDetected": import.bundle_format_detected,
            "checksumVerified": import.checksum_verified
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "exchange.exportJson" => exchange_export_json,
        "exchange.importJson" => exchange_import_json,
        "exchange.clearAll" => exchange_clear_all,
        "backup.exportWorkspaceBundle" => {
            return Some(handle_backup_export_workspace_bundle(state, req))
        }
        "backup.importWorkspaceBundle" => {
            return Some(handle_backup_import_workspace_bundle(state, req))
        }
        _ => return None,
    };
    Some(with_conn(state, req, op))
}
