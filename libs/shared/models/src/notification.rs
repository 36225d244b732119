use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Appointment,
    Note,
    Survey,
    General,
    Call,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Appointment => "appointment",
            NotificationKind::Note => "note",
            NotificationKind::Survey => "survey",
            NotificationKind::General => "general",
            NotificationKind::Call => "call",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbox entry. Only `is_read` changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            link,
        }
    }
}
