use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::TokenQuery;
use crate::services::VideoTokenIssuer;

pub type VideoState = Arc<dyn VideoTokenIssuer>;

#[axum::debug_handler]
pub async fn issue_video_token(
    State(issuer): State<VideoState>,
    Extension(user): Extension<User>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, AppError> {
    let identity = user.email.clone().unwrap_or_else(|| user.id.clone());
    let token = issuer.issue_token(&query.room, &identity)?;

    Ok(Json(json!(token)))
}

#[axum::debug_handler]
pub async fn video_health_check(State(issuer): State<VideoState>) -> Json<Value> {
    if issuer.is_configured() {
        Json(json!({
            "status": "healthy",
            "video_configured": true,
            "provider": "twilio"
        }))
    } else {
        Json(json!({
            "status": "not_configured",
            "video_configured": false,
            "message": "Video conferencing not configured"
        }))
    }
}
