use super::masters::notify_changed;
use crate::auth::{self, Session, SessionUser};
use crate::guard::{self, GuardDecision};
use crate::ipc::error::{ok, ok_with_notice};
use crate::ipc::helpers::{db_conn, get_object, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, User};
use crate::notice::Notice;
use crate::store::{MasterRecord, StoreError};
use serde_json::json;

/// Self-registration always creates a plain user; elevated roles are granted
/// through `users.setRole` or `users.create`.
fn sign_up(state: &AppState, params: &serde_json::Value) -> Result<User, HandlerErr> {
    let conn = db_conn(state)?;
    let mut fields = get_object(params, "fields")?.clone();
    fields["role"] = json!(Role::User.as_str());
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    Ok(auth::create_account(
        conn,
        &fields,
        password,
        state.settings.security.min_password_length,
    )?)
}

fn sign_in(state: &AppState, params: &serde_json::Value) -> Result<User, HandlerErr> {
    let conn = db_conn(state)?;
    let email = get_required_str(params, "email")?;
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing password"))?;
    Ok(auth::sign_in(conn, &email, password)?)
}

fn signed_in(state: &mut AppState, user: &User) -> serde_json::Value {
    tracing::info!(uid = %user.id, role = user.role.as_str(), "signed in");
    state.set_session(Session::SignedIn {
        user: SessionUser::from(user),
    });
    json!({ "session": state.session, "redirect": user.role.dashboard_route() })
}

fn handle_sign_up(state: &mut AppState, req: &Request) -> serde_json::Value {
    let dismiss = state.dismiss_ms();
    match sign_up(state, &req.params) {
        Ok(user) => {
            let result = signed_in(state, &user);
            notify_changed(state, User::COLLECTION);
            ok_with_notice(
                &req.id,
                result,
                Notice::success("Account created successfully", dismiss),
            )
        }
        Err(e) => e.response(&req.id, dismiss),
    }
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let dismiss = state.dismiss_ms();
    match sign_in(state, &req.params) {
        Ok(user) => {
            let result = signed_in(state, &user);
            ok_with_notice(
                &req.id,
                result,
                Notice::success(format!("Welcome, {}", user.username), dismiss),
            )
        }
        Err(e) => e.response(&req.id, dismiss),
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    let dismiss = state.dismiss_ms();
    if let Err(e) = db_conn(state) {
        return e.response(&req.id, dismiss);
    }
    if let Some(user) = state.session.user() {
        tracing::info!(uid = %user.uid, "signed out");
    }
    state.set_session(Session::SignedOut);
    ok_with_notice(
        &req.id,
        json!({ "session": state.session, "redirect": guard::LOGIN_ROUTE }),
        Notice::info("Signed out", dismiss),
    )
}

fn parse_roles(params: &serde_json::Value) -> Result<Option<Vec<Role>>, HandlerErr> {
    let Some(raw) = params.get("allowedRoles") else {
        return Ok(None);
    };
    let list = raw
        .as_array()
        .ok_or_else(|| HandlerErr::bad_params("allowedRoles must be an array"))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .and_then(Role::parse)
                .ok_or_else(|| StoreError::invalid("allowedRoles", format!("unknown role {v}")))
                .map_err(HandlerErr::from)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// What the shell should do with `route` for the current session. Explicit
/// `allowedRoles` override the route table; unknown routes are public.
fn handle_guard_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let dismiss = state.dismiss_ms();
    let route = match get_required_str(&req.params, "route") {
        Ok(r) => r,
        Err(e) => return e.response(&req.id, dismiss),
    };
    let decision = match parse_roles(&req.params) {
        Ok(Some(roles)) => guard::resolve(&state.session, &roles),
        Ok(None) => guard::resolve_route(&state.session, &route)
            .unwrap_or(GuardDecision::Authorized),
        Err(e) => return e.response(&req.id, dismiss),
    };
    tracing::debug!(%route, ?decision, "guard resolved");
    ok(
        &req.id,
        json!({ "route": route, "decision": decision, "session": state.session }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.signUp" => Some(handle_sign_up(state, req)),
        "auth.signIn" => Some(handle_sign_in(state, req)),
        "auth.signOut" => Some(handle_sign_out(state, req)),
        "auth.session" => Some(ok(&req.id, json!({ "session": state.session }))),
        "guard.resolve" => Some(handle_guard_resolve(state, req)),
        _ => None,
    }
}
