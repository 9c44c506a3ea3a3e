//! `<collection>.list/get/create/update/delete/search` for every master, and
//! live collection subscriptions.

use crate::ipc::error::{ok, ok_with_notice};
use crate::ipc::helpers::{
    db_conn, get_object, get_opt_str, get_required_str, require_confirm, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    AcademicSession, Board, Designation, Institution, Location, SchoolRow, Staff, Stream,
    SubLocation, User,
};
use crate::notice::Notice;
use crate::store::{self, MasterRecord, StoreResult};
use rusqlite::Connection;
use serde_json::json;

/// Collections a client may subscribe to, with their singular display label.
const COLLECTIONS: &[(&str, &str)] = &[
    (Institution::COLLECTION, "Institution"),
    (Board::COLLECTION, "Board"),
    (Designation::COLLECTION, "Designation"),
    (AcademicSession::COLLECTION, "Session"),
    (Location::COLLECTION, "Location"),
    (SubLocation::COLLECTION, "Sub-location"),
    (Stream::COLLECTION, "Stream"),
    (Staff::COLLECTION, "Staff member"),
    (User::COLLECTION, "User"),
    (SchoolRow::COLLECTION, "School"),
];

fn label(collection: &str) -> &'static str {
    COLLECTIONS
        .iter()
        .find(|(name, _)| *name == collection)
        .map(|(_, label)| *label)
        .unwrap_or("Record")
}

fn items_json<T: MasterRecord>(conn: &Connection) -> StoreResult<serde_json::Value> {
    Ok(serde_json::to_value(store::list::<T>(conn)?)?)
}

/// Current documents of a collection by wire name.
pub(super) fn collection_items(
    conn: &Connection,
    collection: &str,
) -> StoreResult<Option<serde_json::Value>> {
    let items = match collection {
        "institutions" => items_json::<Institution>(conn)?,
        "boards" => items_json::<Board>(conn)?,
        "designations" => items_json::<Designation>(conn)?,
        "sessions" => items_json::<AcademicSession>(conn)?,
        "locations" => items_json::<Location>(conn)?,
        "subLocations" => items_json::<SubLocation>(conn)?,
        "streams" => items_json::<Stream>(conn)?,
        "staff" => items_json::<Staff>(conn)?,
        "users" => items_json::<User>(conn)?,
        "schoolData" => items_json::<SchoolRow>(conn)?,
        _ => return Ok(None),
    };
    Ok(Some(items))
}

/// Queues a snapshot event when someone subscribed to `collection`.
pub(super) fn notify_changed(state: &mut AppState, collection: &str) {
    if !state.subscriptions.contains(collection) {
        return;
    }
    let Some(conn) = state.db.as_ref() else {
        return;
    };
    match collection_items(conn, collection) {
        Ok(Some(items)) => state.outbox.push(json!({
            "event": "collection.snapshot",
            "collection": collection,
            "items": items,
        })),
        Ok(None) => {}
        Err(e) => tracing::warn!(collection, error = %e, "snapshot skipped"),
    }
}

fn list<T: MasterRecord>(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let items = if T::COLLECTION == SubLocation::COLLECTION {
        match get_opt_str(params, "locationId") {
            Some(location_id) => {
                serde_json::to_value(store::list_by::<T>(conn, "location_id", &location_id)?)
                    .map_err(store::StoreError::from)?
            }
            None => items_json::<T>(conn)?,
        }
    } else {
        items_json::<T>(conn)?
    };
    Ok(json!({ "items": items }))
}

fn get<T: MasterRecord>(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = get_required_str(params, "id")?;
    let item = store::get::<T>(conn, &id)?.ok_or_else(|| store::StoreError::NotFound {
        collection: T::COLLECTION,
        id: id.clone(),
    })?;
    Ok(json!({ "item": item }))
}

fn search<T: MasterRecord>(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let text = params.get("text").and_then(|v| v.as_str()).unwrap_or("");
    let items = store::search::<T>(conn, text)?;
    Ok(json!({ "items": items }))
}

fn create<T: MasterRecord>(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<(serde_json::Value, String), HandlerErr> {
    let conn = db_conn(state)?;
    let fields = get_object(params, "fields")?;
    let item = store::create::<T>(conn, fields)?;
    tracing::info!(collection = T::COLLECTION, id = item.id(), "created");
    let items = items_json::<T>(conn)?;
    Ok((
        json!({ "item": item, "items": items }),
        format!("{} created successfully", label(T::COLLECTION)),
    ))
}

fn update<T: MasterRecord>(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<(serde_json::Value, String), HandlerErr> {
    let conn = db_conn(state)?;
    let id = get_required_str(params, "id")?;
    let fields = get_object(params, "fields")?;
    let item = store::update::<T>(conn, &id, fields)?;
    tracing::info!(collection = T::COLLECTION, id = %id, "updated");
    let items = items_json::<T>(conn)?;
    Ok((
        json!({ "item": item, "items": items }),
        format!("{} updated successfully", label(T::COLLECTION)),
    ))
}

fn delete<T: MasterRecord>(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<(serde_json::Value, String), HandlerErr> {
    let conn = db_conn(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(state, params)?;
    store::delete::<T>(conn, &id)?;
    tracing::info!(collection = T::COLLECTION, id = %id, "deleted");
    let items = items_json::<T>(conn)?;
    Ok((
        json!({ "id": id, "items": items }),
        format!("{} deleted successfully", label(T::COLLECTION)),
    ))
}

/// Runs one master operation. Mutations carry a success toast and refresh
/// subscribers.
pub(super) fn dispatch<T: MasterRecord>(
    state: &mut AppState,
    req: &Request,
    op: &str,
) -> Option<serde_json::Value> {
    let dismiss = state.dismiss_ms();
    let read = match op {
        "list" => Some(list::<T>(state, &req.params)),
        "get" => Some(get::<T>(state, &req.params)),
        "search" => Some(search::<T>(state, &req.params)),
        _ => None,
    };
    if let Some(result) = read {
        return Some(match result {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id, dismiss),
        });
    }

    let written = match op {
        "create" => create::<T>(state, &req.params),
        "update" => update::<T>(state, &req.params),
        "delete" => delete::<T>(state, &req.params),
        _ => return None,
    };
    Some(match written {
        Ok((result, message)) => {
            notify_changed(state, T::COLLECTION);
            ok_with_notice(&req.id, result, Notice::success(message, dismiss))
        }
        Err(e) => e.response(&req.id, dismiss),
    })
}

fn handle_subscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let dismiss = state.dismiss_ms();
    let result = (|| {
        let conn = db_conn(state)?;
        let collection = get_required_str(&req.params, "collection")?;
        let items = collection_items(conn, &collection)?.ok_or_else(|| {
            HandlerErr::bad_params(format!("unknown collection: {}", collection))
        })?;
        Ok::<_, HandlerErr>((collection, items))
    })();
    match result {
        Ok((collection, items)) => {
            tracing::debug!(%collection, "subscribed");
            state.subscriptions.insert(collection.clone());
            ok(
                &req.id,
                json!({ "subscribed": true, "collection": collection, "items": items }),
            )
        }
        Err(e) => e.response(&req.id, dismiss),
    }
}

fn handle_unsubscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    match get_required_str(&req.params, "collection") {
        Ok(collection) => {
            let removed = state.subscriptions.remove(&collection);
            ok(
                &req.id,
                json!({ "subscribed": false, "collection": collection, "removed": removed }),
            )
        }
        Err(e) => e.response(&req.id, state.dismiss_ms()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (collection, op) = req.method.split_once('.')?;
    match collection {
        "collections" => match op {
            "subscribe" => Some(handle_subscribe(state, req)),
            "unsubscribe" => Some(handle_unsubscribe(state, req)),
            _ => None,
        },
        "institutions" => dispatch::<Institution>(state, req, op),
        "boards" => dispatch::<Board>(state, req, op),
        "designations" => dispatch::<Designation>(state, req, op),
        "sessions" => dispatch::<AcademicSession>(state, req, op),
        "locations" => dispatch::<Location>(state, req, op),
        "subLocations" => dispatch::<SubLocation>(state, req, op),
        "streams" => dispatch::<Stream>(state, req, op),
        "staff" => dispatch::<Staff>(state, req, op),
        _ => None,
    }
}
