//! Workspace settings, stored per section as JSON in the `settings` table.

use crate::db;
use crate::notice::DEFAULT_DISMISS_MS;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSection {
    Notifications,
    Reports,
    Security,
}

impl SetupSection {
    pub const ALL: [SetupSection; 3] = [Self::Notifications, Self::Reports, Self::Security];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "notifications" => Some(Self::Notifications),
            "reports" => Some(Self::Reports),
            "security" => Some(Self::Security),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::Reports => "reports",
            Self::Security => "security",
        }
    }

    fn key(self) -> String {
        format!("setup.{}", self.name())
    }
}

pub fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Notifications => json!({
            "dismissAfterMs": DEFAULT_DISMISS_MS
        }),
        SetupSection::Reports => json!({
            "pageSize": 30,
            "pageBreakY": 750,
            "showGeneratedAt": true,
            "fontPath": ""
        }),
        SetupSection::Security => json!({
            "confirmDeletes": true,
            "minPasswordLength": 6
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "stored section must be a JSON object".to_string())?;
    for (k, v) in patch {
        let value = match (section, k.as_str()) {
            (SetupSection::Notifications, "dismissAfterMs") => {
                Value::from(parse_i64_range(v, k, 500, 60_000)?)
            }
            (SetupSection::Reports, "pageSize") => Value::from(parse_i64_range(v, k, 5, 500)?),
            (SetupSection::Reports, "pageBreakY") => {
                Value::from(parse_i64_range(v, k, 200, 800)?)
            }
            (SetupSection::Reports, "showGeneratedAt") => Value::Bool(parse_bool(v, k)?),
            (SetupSection::Reports, "fontPath") => v
                .as_str()
                .map(|p| Value::String(p.trim().to_string()))
                .ok_or_else(|| format!("{} must be a string", k))?,
            (SetupSection::Security, "confirmDeletes") => Value::Bool(parse_bool(v, k)?),
            (SetupSection::Security, "minPasswordLength") => {
                Value::from(parse_i64_range(v, k, 6, 64)?)
            }
            _ => return Err(format!("unknown {} field: {}", section.name(), k)),
        };
        obj.insert(k.clone(), value);
    }
    Ok(())
}

/// Stored values layered over the defaults, so sections saved by an older
/// build still pick up fields added later.
pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut out = default_section(section);
    if let Some(Value::Object(saved)) = db::settings_get_json(conn, &section.key())? {
        if let Some(obj) = out.as_object_mut() {
            for (k, v) in saved {
                obj.insert(k, v);
            }
        }
    }
    Ok(out)
}

pub fn save_section(conn: &Connection, section: SetupSection, value: &Value) -> anyhow::Result<()> {
    db::settings_set_json(conn, &section.key(), value)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub dismiss_after_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettings {
    pub page_size: usize,
    pub page_break_y: f32,
    pub show_generated_at: bool,
    /// TrueType/OpenType file embedded in exported PDFs; blank means the
    /// built-in Helvetica faces.
    #[serde(default)]
    pub font_path: String,
}

impl ReportSettings {
    pub fn font_file(&self) -> Option<PathBuf> {
        let path = self.font_path.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    pub confirm_deletes: bool,
    pub min_password_length: usize,
}

/// Typed view of every section, refreshed whenever the workspace opens or a
/// section is updated.
#[derive(Debug, Clone)]
pub struct Settings {
    pub notifications: NotificationSettings,
    pub reports: ReportSettings,
    pub security: SecuritySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            notifications: NotificationSettings {
                dismiss_after_ms: DEFAULT_DISMISS_MS,
            },
            reports: ReportSettings {
                page_size: 30,
                page_break_y: crate::pdf::DEFAULT_PAGE_BREAK_Y,
                show_generated_at: true,
                font_path: String::new(),
            },
            security: SecuritySettings {
                confirm_deletes: true,
                min_password_length: 6,
            },
        }
    }
}

impl Settings {
    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        Ok(Settings {
            notifications: serde_json::from_value(load_section(
                conn,
                SetupSection::Notifications,
            )?)?,
            reports: serde_json::from_value(load_section(conn, SetupSection::Reports)?)?,
            security: serde_json::from_value(load_section(conn, SetupSection::Security)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_into_typed_settings() {
        let reports: ReportSettings =
            serde_json::from_value(default_section(SetupSection::Reports)).unwrap();
        assert_eq!(reports.page_size, 30);
        assert_eq!(reports.page_break_y, 750.0);
        assert_eq!(reports.font_file(), None);
        let notes: NotificationSettings =
            serde_json::from_value(default_section(SetupSection::Notifications)).unwrap();
        assert_eq!(notes.dismiss_after_ms, 3000);
    }

    #[test]
    fn patch_rejects_unknown_and_out_of_range_fields() {
        let mut cur = default_section(SetupSection::Reports);
        let bad = json!({ "pageSize": 1 });
        assert!(merge_section_patch(SetupSection::Reports, &mut cur, bad.as_object().unwrap())
            .is_err());
        let unknown = json!({ "fontScale": 100 });
        assert!(
            merge_section_patch(SetupSection::Reports, &mut cur, unknown.as_object().unwrap())
                .is_err()
        );
        let good = json!({ "pageSize": 50 });
        merge_section_patch(SetupSection::Reports, &mut cur, good.as_object().unwrap()).unwrap();
        assert_eq!(cur["pageSize"], 50);
    }
}
