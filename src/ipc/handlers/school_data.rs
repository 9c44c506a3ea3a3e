use super::masters::{dispatch, notify_changed};
use crate::ipc::error::{ok, ok_with_notice};
use crate::ipc::helpers::{db_conn, get_opt_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::SchoolRow;
use crate::notice::Notice;
use crate::reports;
use crate::roster;
use crate::store::{self, MasterRecord};
use crate::uid::board_key;
use anyhow::Context;
use serde_json::json;
use std::path::Path;

/// Parsed roster from `csvText`, or from the file at `filePath` (`csvPath`
/// is accepted too). Workbooks are read from their first sheet.
fn read_roster(params: &serde_json::Value) -> Result<roster::RosterParse, HandlerErr> {
    let bad_roster = |e: roster::RosterError| HandlerErr::bad_params(e.to_string());
    if let Some(text) = params.get("csvText").and_then(|v| v.as_str()) {
        return roster::parse_roster(text).map_err(bad_roster);
    }
    let Some(path) = get_opt_str(params, "filePath").or_else(|| get_opt_str(params, "csvPath"))
    else {
        return Err(HandlerErr::bad_params("missing filePath or csvText"));
    };
    if roster::is_workbook(Path::new(&path)) {
        let records =
            roster::read_workbook(Path::new(&path)).map_err(|e| HandlerErr::io(e, &path))?;
        return roster::parse_records(records).map_err(bad_roster);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read roster {}", path))
        .map_err(|e| HandlerErr::io(e, &path))?;
    roster::parse_roster(&text).map_err(bad_roster)
}

fn upload(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<(serde_json::Value, Notice), HandlerErr> {
    let conn = db_conn(state)?;
    let parsed = read_roster(params)?;
    for w in &parsed.warnings {
        tracing::warn!(line = w.line, code = w.code, "{}", w.message);
    }
    let stored = roster::upload(conn, &parsed.rows)?;

    let dismiss = state.dismiss_ms();
    let notice = if stored.is_empty() {
        Notice::info("No rows to upload", dismiss)
    } else {
        Notice::success(format!("{} schools uploaded", stored.len()), dismiss)
    };
    Ok((
        json!({
            "inserted": stored.len(),
            "rowsTotal": parsed.rows_total,
            "rows": stored,
            "warnings": parsed.warnings,
        }),
        notice,
    ))
}

/// Rows for one board (or all), in SN order.
pub(super) fn rows_for_board(
    state: &AppState,
    board: Option<&str>,
) -> Result<Vec<SchoolRow>, HandlerErr> {
    let conn = db_conn(state)?;
    let rows = match board {
        Some(b) => store::list_by::<SchoolRow>(conn, "board_key", &board_key(b))?,
        None => store::list::<SchoolRow>(conn)?,
    };
    Ok(rows)
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let board = get_opt_str(params, "board");
    let rows = rows_for_board(state, board.as_deref())?;
    let page = params.get("page").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
    let paged = reports::paginate(&rows, page, state.settings.reports.page_size);
    Ok(json!(paged))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op = req.method.strip_prefix("schoolData.")?;
    let dismiss = state.dismiss_ms();
    match op {
        "upload" => Some(match upload(state, &req.params) {
            Ok((result, notice)) => {
                notify_changed(state, SchoolRow::COLLECTION);
                ok_with_notice(&req.id, result, notice)
            }
            Err(e) => e.response(&req.id, dismiss),
        }),
        "list" => Some(match list(state, &req.params) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id, dismiss),
        }),
        "search" | "get" | "delete" => dispatch::<SchoolRow>(state, req, op),
        _ => None,
    }
}
