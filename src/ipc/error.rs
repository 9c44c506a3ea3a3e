use crate::notice::Notice;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

/// Success response carrying a toast for the shell.
pub fn ok_with_notice(id: &str, result: serde_json::Value, notice: Notice) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result,
        "notice": notice
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}
