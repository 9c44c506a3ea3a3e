use crate::auth::{AuthError, SessionUser};
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::notice::Notice;
use crate::store::StoreError;
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn io(e: anyhow::Error, path: &str) -> Self {
        Self::new("io_failed", format!("{e:#}")).with_details(json!({ "path": path }))
    }

    /// Error response with the matching error toast.
    pub fn response(self, id: &str, dismiss_after_ms: u64) -> serde_json::Value {
        let notice = Notice::error(self.message.clone(), dismiss_after_ms);
        let mut resp = err(id, self.code, self.message, self.details);
        resp["notice"] = json!(notice);
        resp
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        let code = e.code();
        match &e {
            StoreError::MissingFields(fields) => {
                HandlerErr::new(code, e.to_string()).with_details(json!({ "fields": fields }))
            }
            StoreError::InvalidField { field, .. } => {
                HandlerErr::new(code, e.to_string()).with_details(json!({ "field": field }))
            }
            StoreError::NotFound { .. }
            | StoreError::Conflict { .. }
            | StoreError::Document(_) => HandlerErr::new(code, e.to_string()),
            StoreError::Query(_) | StoreError::Write { .. } => {
                tracing::error!(code, error = %e, "database call failed");
                let message = match code {
                    "db_query_failed" => "Failed to load data",
                    "db_insert_failed" => "Failed to save",
                    "db_update_failed" => "Failed to update",
                    "db_delete_failed" => "Failed to delete",
                    _ => "Database transaction failed",
                };
                HandlerErr::new(code, message).with_details(json!({ "error": e.to_string() }))
            }
        }
    }
}

impl From<AuthError> for HandlerErr {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Store(inner) => inner.into(),
            other => HandlerErr::new(other.code(), other.to_string()),
        }
    }
}

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_object<'a>(
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a serde_json::Value, HandlerErr> {
    params
        .get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an object", key)))
}

/// Deletes need `confirm: true` while `security.confirmDeletes` is on.
pub fn require_confirm(state: &AppState, params: &serde_json::Value) -> Result<(), HandlerErr> {
    let confirmed = params
        .get("confirm")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if state.settings.security.confirm_deletes && !confirmed {
        return Err(HandlerErr::new(
            "confirm_required",
            "delete must be confirmed",
        ));
    }
    Ok(())
}

pub fn require_user(state: &AppState) -> Result<&SessionUser, HandlerErr> {
    state
        .session
        .user()
        .ok_or_else(|| HandlerErr::new("unauthenticated", "sign in first"))
}
