use serde::Serialize;
use thiserror::Error;

use shared_models::error::AppError;
use shared_models::notification::Notification;

/// Latest notifications plus the total unread count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbox {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for NotificationError {
    fn from(err: anyhow::Error) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
