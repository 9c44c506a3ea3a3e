use super::school_data::rows_for_board;
use crate::forms;
use crate::ipc::error::{ok, ok_with_notice};
use crate::ipc::helpers::{db_conn, get_opt_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    AcademicSession, Board, Designation, Institution, Location, SchoolRow, Staff, Stream,
    SubLocation, User,
};
use crate::notice::Notice;
use crate::reports;
use crate::store::{self, MasterRecord};
use anyhow::Context;
use serde_json::{json, Map};
use std::path::Path;

fn school_data_pdf(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_str(params, "outPath")?;
    let board = get_opt_str(params, "board");
    let rows = rows_for_board(state, board.as_deref())?;

    let cfg = &state.settings.reports;
    let title = match &board {
        Some(b) => format!("School Data: {}", b),
        None => "School Data".to_string(),
    };
    let generated_at = cfg
        .show_generated_at
        .then(|| chrono::Local::now().format("%Y-%m-%d %H:%M").to_string());
    let doc = reports::render_school_report(
        &rows,
        &title,
        generated_at.as_deref(),
        cfg.page_break_y,
    )
    .with_font_file(cfg.font_file());
    doc.write_to(Path::new(&out_path))
        .map_err(|e| HandlerErr::io(e, &out_path))?;
    tracing::info!(
        path = %out_path,
        rows = rows.len(),
        pages = doc.page_count(),
        "school report exported"
    );
    Ok(json!({
        "path": out_path,
        "rowCount": rows.len(),
        "pageCount": doc.page_count()
    }))
}

fn school_data_csv(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_str(params, "outPath")?;
    let board = get_opt_str(params, "board");
    let rows = rows_for_board(state, board.as_deref())?;
    let csv = reports::school_data_csv(&rows);

    let path = Path::new(&out_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))
            .map_err(|e| HandlerErr::io(e, &out_path))?;
    }
    std::fs::write(path, csv)
        .with_context(|| format!("failed to write {}", out_path))
        .map_err(|e| HandlerErr::io(e, &out_path))?;
    tracing::info!(path = %out_path, rows = rows.len(), "school csv exported");
    Ok(json!({ "path": out_path, "rowCount": rows.len() }))
}

fn dashboard_summary(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let mut counts = Map::new();
    let mut put = |name: &str, n: i64| {
        counts.insert(name.to_string(), json!(n));
    };
    put(Institution::COLLECTION, store::count::<Institution>(conn)?);
    put(Board::COLLECTION, store::count::<Board>(conn)?);
    put(Designation::COLLECTION, store::count::<Designation>(conn)?);
    put(AcademicSession::COLLECTION, store::count::<AcademicSession>(conn)?);
    put(Location::COLLECTION, store::count::<Location>(conn)?);
    put(SubLocation::COLLECTION, store::count::<SubLocation>(conn)?);
    put(Stream::COLLECTION, store::count::<Stream>(conn)?);
    put(Staff::COLLECTION, store::count::<Staff>(conn)?);
    put(User::COLLECTION, store::count::<User>(conn)?);
    put(SchoolRow::COLLECTION, store::count::<SchoolRow>(conn)?);
    put("dataForms", forms::count(conn)?);
    Ok(json!({ "counts": counts, "session": state.session }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let dismiss = state.dismiss_ms();
    let (result, success) = match req.method.as_str() {
        "reports.schoolData.exportPdf" => (
            school_data_pdf(state, &req.params),
            Some("PDF generated successfully"),
        ),
        "reports.schoolData.exportCsv" => (
            school_data_csv(state, &req.params),
            Some("CSV exported successfully"),
        ),
        "dashboard.summary" => (dashboard_summary(state), None),
        _ => return None,
    };
    Some(match (result, success) {
        (Ok(v), Some(message)) => ok_with_notice(&req.id, v, Notice::success(message, dismiss)),
        (Ok(v), None) => ok(&req.id, v),
        (Err(e), _) => e.response(&req.id, dismiss),
    })
}
