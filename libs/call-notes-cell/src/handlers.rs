use axum::{
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_doctor;

use crate::models::{
    AudioUpload, ClinicalNotesView, EditNoteRequest, GenerateNotesRequest, ManualNotes,
    NoteSummary, PipelineOutcome,
};
use crate::router::NotesState;

const AUDIO_FIELDS: [&str; 2] = ["audio", "recording"];

/// Takes the `audio` part, or failing that the `recording` part. Empty parts
/// count as no recording.
async fn read_audio(multipart: &mut Multipart) -> Result<Option<AudioUpload>, AppError> {
    let mut fallback = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if !AUDIO_FIELDS.contains(&name.as_str()) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read {}: {}", name, e)))?;
        if bytes.is_empty() {
            warn!("Ignoring empty {} upload", name);
            continue;
        }

        let upload = AudioUpload { file_name, bytes };
        if name == "audio" {
            return Ok(Some(upload));
        }
        fallback.get_or_insert(upload);
    }

    Ok(fallback)
}

// ==============================================================================
// RECORDING PIPELINE
// ==============================================================================

#[axum::debug_handler]
pub async fn upload_recording(
    State(state): State<NotesState>,
    Extension(user): Extension<User>,
    Path(meeting_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let audio = read_audio(&mut multipart).await?;
    let report = state.pipeline.process(&user, meeting_id, audio).await?;

    if report.outcome == PipelineOutcome::TranscriptionTimedOut {
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "Transcription timeout",
                "status": report.status,
            })),
        ));
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "status": report.status,
            "outcome": report.outcome,
            "message": report.message,
            "noteId": report.note_id(),
        })),
    ))
}

// ==============================================================================
// NOTE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn generate_notes(
    State(state): State<NotesState>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateNotesRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let response = match state.notes.generate_from_transcript(&user, request).await? {
        ManualNotes::Parsed(note) => json!({
            "success": true,
            "noteId": note.id,
            "notes": ClinicalNotesView::from(&note.fields),
        }),
        ManualNotes::Raw { note, raw } => json!({
            "success": true,
            "noteId": note.id,
            "notes": { "raw": raw },
            "warning": "Note stored as raw text - JSON parsing failed",
        }),
    };

    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn list_notes(
    State(state): State<NotesState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<NoteSummary>>, AppError> {
    require_doctor(&user)?;

    let notes = state.notes.list_for_doctor(&user).await?;
    Ok(Json(notes))
}

#[axum::debug_handler]
pub async fn edit_note(
    State(state): State<NotesState>,
    Extension(user): Extension<User>,
    Path(note_id): Path<Uuid>,
    Json(request): Json<EditNoteRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let note = state.notes.edit_note(&user, note_id, request.into()).await?;

    Ok(Json(json!({
        "success": true,
        "id": note.id,
        "notes": ClinicalNotesView::from(&note.fields),
        "isEdited": note.is_edited,
        "editedAt": note.edited_at,
    })))
}
