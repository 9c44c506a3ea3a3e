use serde::Serialize;

pub const DEFAULT_DISMISS_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// Toast shown by the shell after a mutation; it dismisses itself after
/// `dismiss_after_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub dismiss_after_ms: u64,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>, dismiss_after_ms: u64) -> Self {
        Notice {
            kind,
            message: message.into(),
            dismiss_after_ms,
        }
    }

    pub fn success(message: impl Into<String>, dismiss_after_ms: u64) -> Self {
        Self::new(NoticeKind::Success, message, dismiss_after_ms)
    }

    pub fn error(message: impl Into<String>, dismiss_after_ms: u64) -> Self {
        Self::new(NoticeKind::Error, message, dismiss_after_ms)
    }

    pub fn info(message: impl Into<String>, dismiss_after_ms: u64) -> Self {
        Self::new(NoticeKind::Info, message, dismiss_after_ms)
    }
}
