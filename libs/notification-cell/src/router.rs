use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::notifier::NotificationService;

pub fn notification_routes(config: Arc<AppConfig>, service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/read-all", post(handlers::mark_all_notifications_read))
        .route("/{notification_id}/read", post(handlers::mark_notification_read))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
