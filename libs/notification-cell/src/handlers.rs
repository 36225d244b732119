use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::services::notifier::NotificationService;

#[axum::debug_handler]
pub async fn list_notifications(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let inbox = service.inbox(user.uuid()?).await?;

    Ok(Json(json!(inbox)))
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    service.mark_read(notification_id, user.uuid()?).await?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn mark_all_notifications_read(
    State(service): State<Arc<NotificationService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let updated = service.mark_all_read(user.uuid()?).await?;

    Ok(Json(json!({ "success": true, "updated": updated })))
}
