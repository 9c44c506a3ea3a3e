use super::core::open_workspace;
use crate::backup;
use crate::ipc::error::ok_with_notice;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::notice::Notice;
use serde_json::json;
use std::path::PathBuf;

fn workspace_path(state: &AppState) -> Result<PathBuf, HandlerErr> {
    state
        .workspace
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn export_bundle(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_str(params, "outPath")?;
    let workspace = workspace_path(state)?;
    if let Some(conn) = state.db.as_ref() {
        let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");
    }
    let export = backup::export_workspace_bundle(&workspace, &PathBuf::from(&out_path))
        .map_err(|e| HandlerErr::io(e, &out_path))?;
    Ok(json!({
        "path": out_path,
        "bundleFormat": export.manifest.format,
        "dbSha256": export.manifest.db_sha256,
        "entryCount": export.entry_count
    }))
}

/// Replaces the workspace database with the bundle's copy and reopens it.
/// The session starts over signed out.
fn import_bundle(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let in_path = get_required_str(params, "inPath")?;
    let workspace = workspace_path(state)?;
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": in_path })));
    }

    // Release the handle before the file underneath it is replaced.
    state.db = None;
    let imported = backup::import_workspace_bundle(&src, &workspace);
    // Reopen either way so a rejected bundle leaves the old workspace usable.
    open_workspace(state, workspace.clone())?;
    let manifest = imported.map_err(|e| HandlerErr::io(e, &in_path))?;
    Ok(json!({
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormat": manifest.format,
        "exportedAt": manifest.exported_at
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (result, message) = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => {
            (export_bundle(state, &req.params), "Backup exported")
        }
        "backup.importWorkspaceBundle" => {
            (import_bundle(state, &req.params), "Backup restored")
        }
        _ => return None,
    };
    let dismiss = state.dismiss_ms();
    Some(match result {
        Ok(v) => ok_with_notice(&req.id, v, Notice::success(message, dismiss)),
        Err(e) => e.response(&req.id, dismiss),
    })
}
