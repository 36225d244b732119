use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::linking::QrLinkService;

pub fn qr_link_routes(config: Arc<AppConfig>, service: Arc<QrLinkService>) -> Router {
    let public_routes = Router::new().route("/verify/{token}", get(handlers::verify_token));

    let protected_routes = Router::new()
        .route("/generate", post(handlers::generate_qr))
        .route("/tokens", get(handlers::list_tokens))
        .route("/link", post(handlers::link_patient))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(service)
}
