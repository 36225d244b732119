use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_doctor, require_patient};

use crate::models::{GeneratedQr, LinkRequest, QrTokenSummary, TokenVerification};
use crate::services::linking::QrLinkService;

#[axum::debug_handler]
pub async fn generate_qr(
    State(service): State<Arc<QrLinkService>>,
    Extension(user): Extension<User>,
) -> Result<Json<GeneratedQr>, AppError> {
    require_doctor(&user)?;

    Ok(Json(service.generate(&user).await?))
}

#[axum::debug_handler]
pub async fn list_tokens(
    State(service): State<Arc<QrLinkService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<QrTokenSummary>>, AppError> {
    require_doctor(&user)?;

    Ok(Json(service.list(&user).await?))
}

/// Public: the landing page calls this before the patient signs in.
#[axum::debug_handler]
pub async fn verify_token(
    State(service): State<Arc<QrLinkService>>,
    Path(token): Path<String>,
) -> Result<Json<TokenVerification>, AppError> {
    Ok(Json(service.verify(&token, Utc::now()).await?))
}

#[axum::debug_handler]
pub async fn link_patient(
    State(service): State<Arc<QrLinkService>>,
    Extension(user): Extension<User>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<Value>, AppError> {
    require_patient(&user)?;

    let link = service.link(&user, &request.token, Utc::now()).await?;

    Ok(Json(json!({
        "success": true,
        "doctorId": link.doctor_id,
        "linkedAt": link.linked_at,
    })))
}
