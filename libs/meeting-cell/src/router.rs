use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::scheduling::MeetingService;

pub fn meeting_routes(config: Arc<AppConfig>, service: Arc<MeetingService>) -> Router {
    Router::new()
        .route("/", post(handlers::create_meeting).get(handlers::list_meetings))
        .route(
            "/{meeting_id}",
            get(handlers::get_meeting).delete(handlers::delete_meeting),
        )
        .route("/{meeting_id}/reschedule", post(handlers::reschedule_meeting))
        .route("/{meeting_id}/cancel", post(handlers::cancel_meeting))
        .route("/{meeting_id}/consent", post(handlers::update_consent))
        .route("/{meeting_id}/start-recording", post(handlers::start_recording))
        .route("/{meeting_id}/participant-event", post(handlers::participant_event))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
