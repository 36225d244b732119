use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_doctor;

use crate::models::{
    ConsentRequest, CreateMeetingRequest, ParticipantEventRequest, RescheduleMeetingRequest,
};
use crate::services::scheduling::MeetingService;

// ==============================================================================
// MEETING SCHEDULING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_meeting(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateMeetingRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let meeting = service.create_meeting(&user, request).await?;

    Ok(Json(json!({
        "id": meeting.id,
        "title": meeting.title,
        "scheduledAt": meeting.scheduled_at,
        "status": meeting.status,
    })))
}

#[axum::debug_handler]
pub async fn list_meetings(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let meetings = service.list_meetings(&user).await?;

    Ok(Json(json!({ "meetings": meetings })))
}

#[axum::debug_handler]
pub async fn get_meeting(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let view = service.get_meeting(&user, meeting_id).await?;

    Ok(Json(json!(view)))
}

#[axum::debug_handler]
pub async fn delete_meeting(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    service.delete(&user, meeting_id).await?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn reschedule_meeting(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<RescheduleMeetingRequest>,
) -> Result<Json<Value>, AppError> {
    let meeting = service
        .reschedule(&user, meeting_id, request.scheduled_at)
        .await?;

    Ok(Json(json!({
        "success": true,
        "scheduledAt": meeting.scheduled_at,
    })))
}

#[axum::debug_handler]
pub async fn cancel_meeting(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let meeting = service.cancel(&user, meeting_id).await?;

    Ok(Json(json!({ "success": true, "status": meeting.status })))
}

// ==============================================================================
// IN-CALL HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_consent(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<ConsentRequest>,
) -> Result<Json<Value>, AppError> {
    let consent = service
        .update_consent(&user, meeting_id, request.status)
        .await?;

    Ok(Json(json!({ "success": true, "consent": consent })))
}

#[axum::debug_handler]
pub async fn start_recording(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let meeting = service.start_recording(&user, meeting_id).await?;

    Ok(Json(json!({
        "success": true,
        "status": meeting.status,
        "startedAt": meeting.started_at,
    })))
}

#[axum::debug_handler]
pub async fn participant_event(
    State(service): State<Arc<MeetingService>>,
    Extension(user): Extension<User>,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<ParticipantEventRequest>,
) -> Result<Json<Value>, AppError> {
    service
        .participant_event(&user, meeting_id, request.event, request.participant_name)
        .await?;

    Ok(Json(json!({ "success": true })))
}
