use crate::forms;
use crate::ipc::error::{ok, ok_with_notice};
use crate::ipc::helpers::{
    db_conn, get_object, get_required_str, require_confirm, require_user, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::User;
use crate::notice::Notice;
use crate::reports;
use crate::store;
use anyhow::Context;
use serde_json::json;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const ATTACHMENTS_DIR: &str = "attachments";

fn submit(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let user = require_user(state)?;
    let form = get_object(params, "form")?;
    let stored = forms::submit(conn, &user.uid, form)?;
    Ok(json!({ "item": stored }))
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let uid = match get_required_str(params, "uid") {
        Ok(uid) => uid,
        Err(e) => state.session.user().map(|u| u.uid.clone()).ok_or(e)?,
    };
    Ok(json!({ "uid": uid, "items": forms::list_for_user(conn, &uid)? }))
}

fn get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = get_required_str(params, "id")?;
    Ok(json!({ "item": forms::get(conn, &id)? }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(state, params)?;
    forms::delete(conn, &id)?;
    tracing::info!(%id, "data form deleted");
    Ok(json!({ "id": id }))
}

fn export_pdf(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = get_required_str(params, "id")?;
    let out_path = get_required_str(params, "outPath")?;
    let form = forms::get(conn, &id)?;
    // The owner may have been deleted since; the report then shows N/A.
    let owner = store::get::<User>(conn, &form.user_id)?;

    let cfg = &state.settings.reports;
    let generated_at = cfg
        .show_generated_at
        .then(|| chrono::Local::now().format("%Y-%m-%d %H:%M").to_string());
    let doc = reports::render_data_form(
        &form,
        owner.as_ref(),
        generated_at.as_deref(),
        cfg.page_break_y,
    )
    .with_font_file(cfg.font_file());
    doc.write_to(Path::new(&out_path))
        .map_err(|e| HandlerErr::io(e, &out_path))?;
    tracing::info!(%id, path = %out_path, pages = doc.page_count(), "data form exported");
    Ok(json!({ "path": out_path, "pageCount": doc.page_count() }))
}

/// Copies a document into the workspace and returns the workspace-relative
/// url stored in `documentUrls`.
fn attach(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let workspace = state
        .workspace
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    require_user(state)?;
    let source = PathBuf::from(get_required_str(params, "sourcePath")?);
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| HandlerErr::bad_params("sourcePath has no file name"))?;
    if !source.is_file() {
        return Err(HandlerErr::new("not_found", "file not found")
            .with_details(json!({ "path": source.to_string_lossy() })));
    }

    let stored_name = format!("{}-{}", Uuid::new_v4().simple(), file_name);
    let dir = workspace.join(ATTACHMENTS_DIR);
    let dst = dir.join(&stored_name);
    std::fs::create_dir_all(&dir)
        .and_then(|_| std::fs::copy(&source, &dst))
        .with_context(|| format!("failed to copy {} into the workspace", source.display()))
        .map_err(|e| HandlerErr::io(e, &source.to_string_lossy()))?;

    let url = format!("{}/{}", ATTACHMENTS_DIR, stored_name);
    tracing::info!(%url, "file attached");
    Ok(json!({ "url": url, "name": file_name }))
}

fn respond(
    state: &AppState,
    req: &Request,
    result: Result<serde_json::Value, HandlerErr>,
    success: Option<&str>,
) -> serde_json::Value {
    let dismiss = state.dismiss_ms();
    match (result, success) {
        (Ok(v), Some(message)) => ok_with_notice(&req.id, v, Notice::success(message, dismiss)),
        (Ok(v), None) => ok(&req.id, v),
        (Err(e), _) => e.response(&req.id, dismiss),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let p = &req.params;
    let resp = match req.method.as_str() {
        "dataForms.submit" => respond(
            state,
            req,
            submit(state, p),
            Some("Form submitted successfully"),
        ),
        "dataForms.list" => respond(state, req, list(state, p), None),
        "dataForms.get" => respond(state, req, get(state, p), None),
        "dataForms.delete" => respond(
            state,
            req,
            delete(state, p),
            Some("Form deleted successfully"),
        ),
        "dataForms.exportPdf" => respond(
            state,
            req,
            export_pdf(state, p),
            Some("PDF generated successfully"),
        ),
        "files.attach" => respond(state, req, attach(state, p), Some("File uploaded")),
        _ => return None,
    };
    Some(resp)
}
