use super::masters::{dispatch, notify_changed};
use crate::auth;
use crate::forms;
use crate::ipc::error::{ok, ok_with_notice};
use crate::ipc::helpers::{db_conn, get_object, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, User};
use crate::notice::Notice;
use crate::store::{self, MasterRecord, StoreError};
use serde_json::json;

fn users_json(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let users = store::list::<User>(db_conn(state)?)?;
    Ok(json!(users))
}

fn users_create(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let fields = get_object(params, "fields")?;
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            HandlerErr::from(StoreError::MissingFields(vec!["password".to_string()]))
        })?;
    let user = auth::create_account(
        conn,
        fields,
        password,
        state.settings.security.min_password_length,
    )?;
    Ok(json!({ "item": user, "items": users_json(state)? }))
}

fn users_update(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = get_required_str(params, "id")?;
    let fields = get_object(params, "fields")?;
    if let Some(email) = fields.get("email").and_then(|v| v.as_str()) {
        if let Some(other) = auth::find_by_email(conn, email)? {
            if other.id != id {
                return Err(StoreError::Conflict {
                    field: "email",
                    value: other.email,
                }
                .into());
            }
        }
    }
    let user = store::update::<User>(conn, &id, fields)?;
    Ok(json!({ "item": user, "items": users_json(state)? }))
}

/// Writes the role, then reads the row back so the caller sees the stored
/// value.
fn users_set_role(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = get_required_str(params, "id")?;
    let raw = get_required_str(params, "role")?;
    let role = Role::parse(&raw)
        .ok_or_else(|| StoreError::invalid("role", format!("unknown role {raw}")))?;

    let changed = conn
        .execute("UPDATE users SET role = ? WHERE id = ?", (role.as_str(), &id))
        .map_err(StoreError::update)?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            collection: User::COLLECTION,
            id,
        }
        .into());
    }
    let user = store::get::<User>(conn, &id)?.ok_or_else(|| StoreError::NotFound {
        collection: User::COLLECTION,
        id: id.clone(),
    })?;
    tracing::info!(uid = %id, role = user.role.as_str(), "role changed");
    Ok(json!({ "item": user, "role": user.role, "items": users_json(state)? }))
}

/// Profile plus the user's submitted data forms, for the user-details view.
fn users_get(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let uid = get_required_str(params, "uid").or_else(|_| get_required_str(params, "id"))?;
    let user = store::get::<User>(conn, &uid)?.ok_or_else(|| StoreError::NotFound {
        collection: User::COLLECTION,
        id: uid.clone(),
    })?;
    let forms = forms::list_for_user(conn, &uid)?;
    Ok(json!({ "item": user, "dataForms": forms }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op = req.method.strip_prefix("users.")?;
    let dismiss = state.dismiss_ms();
    let (result, message) = match op {
        "get" => {
            return Some(match users_get(state, &req.params) {
                Ok(v) => ok(&req.id, v),
                Err(e) => e.response(&req.id, dismiss),
            })
        }
        "create" => (users_create(state, &req.params), "User created successfully"),
        "update" => (users_update(state, &req.params), "User updated successfully"),
        "setRole" => (users_set_role(state, &req.params), "Role updated successfully"),
        _ => return dispatch::<User>(state, req, op),
    };
    Some(match result {
        Ok(v) => {
            notify_changed(state, User::COLLECTION);
            ok_with_notice(&req.id, v, Notice::success(message, dismiss))
        }
        Err(e) => e.response(&req.id, dismiss),
    })
}
