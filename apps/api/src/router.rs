use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use call_notes_cell::call_notes_routes;
use meeting_cell::meeting_routes;
use notification_cell::notification_routes;
use qr_link_cell::qr_link_routes;
use shared_config::AppConfig;
use video_conferencing_cell::video_conferencing_routes;

use crate::state::AppServices;

pub fn create_router(config: Arc<AppConfig>, services: AppServices) -> Router {
    let health = Router::new()
        .route("/health", get(health_check))
        .with_state(config.clone());

    Router::new()
        .route("/", get(|| async { "TeddyBridge API is running!" }))
        .merge(health)
        .nest("/meetings", meeting_routes(config.clone(), services.meetings))
        .nest("/notes", call_notes_routes(config.clone(), services.notes))
        .nest("/qr", qr_link_routes(config.clone(), services.qr))
        .nest(
            "/notifications",
            notification_routes(config.clone(), services.notifier),
        )
        .nest("/video", video_conferencing_routes(config, services.video))
}

async fn health_check(State(config): State<Arc<AppConfig>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "configured": config.is_configured(),
        "services": {
            "transcription": config.is_transcription_configured(),
            "llm": config.is_llm_configured(),
            "video": config.is_video_configured(),
        }
    }))
}
