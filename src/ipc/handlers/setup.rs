use crate::config::{self, Settings, SetupSection};
use crate::ipc::error::{ok, ok_with_notice};
use crate::ipc::helpers::{db_conn, get_opt_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::notice::Notice;
use serde_json::{json, Map};

fn parse_section(raw: &str) -> Result<SetupSection, HandlerErr> {
    SetupSection::parse(raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown section: {}", raw)))
}

fn query_failed(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", "Failed to load settings")
        .with_details(json!({ "error": format!("{e:#}") }))
}

/// One section when `section` is given, otherwise every section.
fn setup_get(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    if let Some(raw) = get_opt_str(params, "section") {
        let section = parse_section(&raw)?;
        let value = config::load_section(conn, section).map_err(query_failed)?;
        return Ok(json!({ "section": section.name(), "value": value }));
    }
    let mut all = Map::new();
    for section in SetupSection::ALL {
        let value = config::load_section(conn, section).map_err(query_failed)?;
        all.insert(section.name().to_string(), value);
    }
    Ok(serde_json::Value::Object(all))
}

fn setup_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let section = parse_section(&get_required_str(params, "section")?)?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let mut current = config::load_section(conn, section).map_err(query_failed)?;
    config::merge_section_patch(section, &mut current, patch)
        .map_err(HandlerErr::bad_params)?;
    config::save_section(conn, section, &current).map_err(|e| {
        HandlerErr::new("db_update_failed", "Failed to save settings")
            .with_details(json!({ "error": format!("{e:#}") }))
    })?;
    let settings = Settings::load(conn).map_err(query_failed)?;
    tracing::info!(section = section.name(), "settings updated");
    state.settings = settings;
    Ok(json!({ "section": section.name(), "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(match setup_get(state, &req.params) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id, state.dismiss_ms()),
        }),
        "setup.update" => {
            let result = setup_update(state, &req.params);
            // Toast timing follows the settings as just saved.
            let dismiss = state.dismiss_ms();
            Some(match result {
                Ok(v) => ok_with_notice(&req.id, v, Notice::success("Settings saved", dismiss)),
                Err(e) => e.response(&req.id, dismiss),
            })
        }
        _ => None,
    }
}
