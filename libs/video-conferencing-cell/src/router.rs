use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{issue_video_token, video_health_check, VideoState};

pub fn video_conferencing_routes(config: Arc<AppConfig>, issuer: VideoState) -> Router {
    let public_routes = Router::new().route("/health", get(video_health_check));

    let protected_routes = Router::new()
        .route("/token", get(issue_video_token))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(issuer)
}
