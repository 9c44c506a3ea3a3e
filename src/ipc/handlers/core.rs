use crate::auth::Session;
use crate::config::Settings;
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "session": state.session,
        }),
    )
}

/// Opens (or reopens) the workspace database and starts a signed-out
/// session on it.
pub(super) fn open_workspace(state: &mut AppState, path: PathBuf) -> Result<(), HandlerErr> {
    let conn = db::open_db(&path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "workspace open failed");
        HandlerErr::io(e, &path.to_string_lossy())
    })?;
    let settings = Settings::load(&conn).map_err(|e| {
        HandlerErr::new("db_query_failed", "Failed to load settings")
            .with_details(json!({ "error": format!("{e:#}") }))
    })?;

    tracing::info!(path = %path.display(), "workspace opened");
    state.workspace = Some(path);
    state.db = Some(conn);
    state.settings = settings;
    state.subscriptions.clear();
    state.set_session(Session::SignedOut);
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match get_required_str(&req.params, "path") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id, state.dismiss_ms()),
    };
    match open_workspace(state, path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => e.response(&req.id, state.dismiss_ms()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
