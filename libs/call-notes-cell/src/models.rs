use std::time::Duration;

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::call_note::{CallNote, CallNoteEdit, ClinicalNoteFields};
use shared_models::error::AppError;
use shared_models::meeting::{MeetingDetails, MeetingStatus};

// ==============================================================================
// REQUEST DTOs
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateNotesRequest {
    #[serde(alias = "meetingId")]
    pub meeting_id: Uuid,
    #[serde(default)]
    pub transcript: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditNoteRequest {
    pub chief_complaint: Option<String>,
    pub hpi: Option<String>,
    pub past_medical_history: Option<String>,
    pub medications: Option<String>,
    pub allergies: Option<String>,
    pub exam_observations: Option<String>,
    pub assessment: Option<String>,
    pub plan: Option<String>,
    pub urgent_flags: Option<Vec<String>>,
    pub follow_up_questions: Option<Vec<String>>,
}

impl From<EditNoteRequest> for CallNoteEdit {
    fn from(request: EditNoteRequest) -> Self {
        Self {
            chief_complaint: request.chief_complaint,
            hpi: request.hpi,
            past_medical_history: request.past_medical_history,
            medications: request.medications,
            allergies: request.allergies,
            exam_observations: request.exam_observations,
            assessment: request.assessment,
            plan: request.plan,
            urgent_flags: request.urgent_flags,
            follow_up_questions: request.follow_up_questions,
        }
    }
}

/// Recording pulled out of a multipart upload.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

// ==============================================================================
// RESPONSE DTOs
// ==============================================================================

/// Note fields as the frontend names them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalNotesView {
    pub chief_complaint: String,
    pub hpi: String,
    pub past_medical_history: String,
    pub medications: String,
    pub allergies: String,
    pub exam_observations: String,
    pub assessment: String,
    pub plan: String,
    pub urgent_flags: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

impl From<&ClinicalNoteFields> for ClinicalNotesView {
    fn from(fields: &ClinicalNoteFields) -> Self {
        Self {
            chief_complaint: fields.chief_complaint.clone(),
            hpi: fields.hpi.clone(),
            past_medical_history: fields.past_medical_history.clone(),
            medications: fields.medications.clone(),
            allergies: fields.allergies.clone(),
            exam_observations: fields.exam_observations.clone(),
            assessment: fields.assessment.clone(),
            plan: fields.plan.clone(),
            urgent_flags: fields.urgent_flags.clone(),
            follow_up_questions: fields.follow_up_questions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub patient_name: String,
    pub meeting_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub notes: ClinicalNotesView,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NoteSummary {
    pub fn new(note: &CallNote, meeting: Option<&MeetingDetails>) -> Self {
        Self {
            id: note.id,
            meeting_id: note.meeting_id,
            patient_name: meeting
                .and_then(|m| m.patient.as_ref())
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            meeting_date: meeting.map(|m| m.meeting.created_at),
            notes: ClinicalNotesView::from(&note.fields),
            is_edited: note.is_edited,
            edited_at: note.edited_at,
            created_at: note.created_at,
        }
    }
}

/// Result of a manual generation request.
#[derive(Debug, Clone)]
pub enum ManualNotes {
    Parsed(CallNote),
    /// The LLM reply was not JSON; the note holds the raw text instead.
    Raw { note: CallNote, raw: String },
}

// ==============================================================================
// TRANSCRIPTION
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl TranscriptStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, TranscriptStatus::Queued | TranscriptStatus::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
}

/// A transcription job as the provider reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptJob {
    pub id: String,
    pub status: TranscriptStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub utterances: Option<Vec<Utterance>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TranscriptJob {
    pub fn has_speaker_labels(&self) -> bool {
        self.utterances.as_ref().is_some_and(|u| !u.is_empty())
    }

    pub fn plain_text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// One `Speaker X: text` line per utterance, or the flat text when the
    /// provider returned no diarization.
    pub fn formatted(&self) -> String {
        match &self.utterances {
            Some(utterances) if !utterances.is_empty() => utterances
                .iter()
                .map(|u| format!("Speaker {}: {}", u.speaker, u.text))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.plain_text().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub ceiling: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            ceiling: Duration::from_secs(300),
        }
    }
}

// ==============================================================================
// LLM WIRE TYPES
// ==============================================================================

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// ==============================================================================
// PIPELINE RESULTS
// ==============================================================================

/// How far a recording got. The meeting status alone cannot tell a call with
/// notes apart from one closed without them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum PipelineOutcome {
    NoRecording,
    TranscriptionSkipped,
    TranscriptionTimedOut,
    TranscriptionFailed(String),
    NotesSkipped,
    NotesGenerated,
    NotesDegraded,
}

impl PipelineOutcome {
    pub fn final_status(&self) -> MeetingStatus {
        match self {
            PipelineOutcome::TranscriptionTimedOut | PipelineOutcome::TranscriptionFailed(_) => {
                MeetingStatus::TranscriptionFailed
            }
            _ => MeetingStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub meeting_id: Uuid,
    pub status: MeetingStatus,
    pub outcome: PipelineOutcome,
    #[serde(skip)]
    pub note: Option<CallNote>,
    pub message: Option<String>,
}

impl PipelineReport {
    pub fn note_id(&self) -> Option<Uuid> {
        self.note.as_ref().map(|n| n.id)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum NoteGenerationError {
    #[error("Meeting not found")]
    MeetingNotFound,

    #[error("Note not found")]
    NoteNotFound,

    #[error("Not authorized for this meeting")]
    Unauthorized,

    #[error("Notes for this meeting are already being generated")]
    AlreadyProcessing,

    #[error("Meeting is {0} and cannot take a recording")]
    InvalidStatus(MeetingStatus),

    #[error("AI service not configured")]
    NotConfigured,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Transcription error: {0}")]
    TranscriptionError(String),

    #[error("LLM error: {0}")]
    CompletionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for NoteGenerationError {
    fn from(err: anyhow::Error) -> Self {
        NoteGenerationError::DatabaseError(err.to_string())
    }
}

impl From<NoteGenerationError> for AppError {
    fn from(err: NoteGenerationError) -> Self {
        match err {
            NoteGenerationError::MeetingNotFound | NoteGenerationError::NoteNotFound => {
                AppError::NotFound(err.to_string())
            }
            NoteGenerationError::Unauthorized => AppError::Forbidden(err.to_string()),
            NoteGenerationError::AlreadyProcessing | NoteGenerationError::InvalidStatus(_) => {
                AppError::Conflict(err.to_string())
            }
            NoteGenerationError::NotConfigured => AppError::ServiceUnavailable(err.to_string()),
            NoteGenerationError::ValidationError(msg) => AppError::ValidationError(msg),
            NoteGenerationError::TranscriptionError(_) | NoteGenerationError::CompletionError(_) => {
                AppError::ExternalService(err.to_string())
            }
            NoteGenerationError::DatabaseError(msg) => AppError::Database(msg),
            NoteGenerationError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_utterances_become_speaker_lines() {
        let job: TranscriptJob = serde_json::from_value(json!({
            "id": "t1",
            "status": "completed",
            "text": "hello there how are you",
            "utterances": [
                {"speaker": "A", "text": "Hello there."},
                {"speaker": "B", "text": "How are you?"}
            ]
        }))
        .unwrap();

        assert!(job.has_speaker_labels());
        assert_eq!(job.formatted(), "Speaker A: Hello there.\nSpeaker B: How are you?");
    }

    #[test]
    fn test_flat_text_without_diarization() {
        let job: TranscriptJob = serde_json::from_value(json!({
            "id": "t1",
            "status": "completed",
            "text": "just text",
            "utterances": null
        }))
        .unwrap();

        assert!(!job.has_speaker_labels());
        assert_eq!(job.formatted(), "just text");
    }

    #[test]
    fn test_unknown_provider_status_is_not_pending() {
        let job: TranscriptJob =
            serde_json::from_value(json!({"id": "t1", "status": "archived"})).unwrap();

        assert_eq!(job.status, TranscriptStatus::Unknown);
        assert!(!job.status.is_pending());
    }

    #[test]
    fn test_outcome_decides_status() {
        assert_eq!(
            PipelineOutcome::TranscriptionTimedOut.final_status(),
            MeetingStatus::TranscriptionFailed
        );
        assert_eq!(PipelineOutcome::NotesDegraded.final_status(), MeetingStatus::Completed);
        assert_eq!(PipelineOutcome::NoRecording.final_status(), MeetingStatus::Completed);
    }

    #[test]
    fn test_manual_request_accepts_both_id_spellings() {
        let id = Uuid::new_v4();
        let snake: GenerateNotesRequest =
            serde_json::from_value(json!({"meeting_id": id, "transcript": "x"})).unwrap();
        let camel: GenerateNotesRequest =
            serde_json::from_value(json!({"meetingId": id, "transcript": "x"})).unwrap();

        assert_eq!(snake.meeting_id, id);
        assert_eq!(camel.meeting_id, id);
    }
}
