use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the caller as a `User` extension.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !request.headers().contains_key(AUTHORIZATION) {
        return Err(AppError::Auth("Missing authorization header".to_string()));
    }

    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;
    let token = bearer.token();

    let user = validate_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;
    debug!("Authenticated {} as {:?}", user.id, user.role);

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn require_doctor(user: &User) -> Result<(), AppError> {
    if user.is_doctor() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only doctors can perform this action".to_string()))
    }
}

pub fn require_patient(user: &User) -> Result<(), AppError> {
    if user.is_patient() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only patients can perform this action".to_string()))
    }
}
