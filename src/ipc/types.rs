use crate::auth::Session;
use crate::config::Settings;
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Session,
    pub settings: Settings,
    /// Collections whose mutations push a `collection.snapshot` event.
    pub subscriptions: HashSet<String>,
    /// Event lines written after the current response.
    pub outbox: Vec<serde_json::Value>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            db: None,
            session: Session::Loading,
            settings: Settings::default(),
            subscriptions: HashSet::new(),
            outbox: Vec::new(),
        }
    }

    pub fn dismiss_ms(&self) -> u64 {
        self.settings.notifications.dismiss_after_ms
    }

    pub fn emit(&mut self, event: serde_json::Value) {
        self.outbox.push(event);
    }

    /// Replaces the session and announces the change.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
        let event = serde_json::json!({
            "event": "auth.stateChanged",
            "session": self.session,
        });
        self.emit(event);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
