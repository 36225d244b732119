use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use shared_database::{CallNoteRepository, MeetingFilter, MeetingRepository, ProfileRepository};
use shared_models::auth::User;
use shared_models::call_note::{CallNote, CallNoteEdit, ClinicalNoteFields, NewCallNote};

use crate::models::{GenerateNotesRequest, ManualNotes, NoteGenerationError, NoteSummary};
use crate::services::completion::CompletionProvider;
use crate::services::parser::{self, MANUAL_PREVIEW_CHARS};
use crate::services::prompt::{self, MANUAL_NOTES_MAX_TOKENS};

/// Doctor-facing note operations outside the recording pipeline.
pub struct NoteService {
    meetings: Arc<dyn MeetingRepository>,
    notes: Arc<dyn CallNoteRepository>,
    profiles: Arc<dyn ProfileRepository>,
    completer: Option<Arc<dyn CompletionProvider>>,
}

impl NoteService {
    pub fn new(
        meetings: Arc<dyn MeetingRepository>,
        notes: Arc<dyn CallNoteRepository>,
        profiles: Arc<dyn ProfileRepository>,
        completer: Option<Arc<dyn CompletionProvider>>,
    ) -> Self {
        Self {
            meetings,
            notes,
            profiles,
            completer,
        }
    }

    pub async fn list_for_doctor(&self, user: &User) -> Result<Vec<NoteSummary>, NoteGenerationError> {
        let user_id = user.uuid().map_err(|_| NoteGenerationError::Unauthorized)?;
        let Some(doctor) = self.profiles.find_doctor_by_user(user_id).await? else {
            return Ok(Vec::new());
        };

        let notes = self.notes.list_notes_for_doctor(doctor.id).await?;
        let meetings: HashMap<Uuid, _> = self
            .meetings
            .list_meetings(MeetingFilter::Doctor(doctor.id))
            .await?
            .into_iter()
            .map(|details| (details.meeting.id, details))
            .collect();

        Ok(notes
            .iter()
            .map(|note| NoteSummary::new(note, meetings.get(&note.meeting_id)))
            .collect())
    }

    /// Applies a doctor's corrections. Notes on someone else's meetings are
    /// reported as missing.
    pub async fn edit_note(
        &self,
        user: &User,
        note_id: Uuid,
        edit: CallNoteEdit,
    ) -> Result<CallNote, NoteGenerationError> {
        if edit.is_empty() {
            return Err(NoteGenerationError::ValidationError(
                "No note fields to update".to_string(),
            ));
        }
        let editor = user.uuid().map_err(|_| NoteGenerationError::Unauthorized)?;

        let note = self
            .notes
            .find_note(note_id)
            .await?
            .ok_or(NoteGenerationError::NoteNotFound)?;
        let owned = self
            .meetings
            .find_meeting(note.meeting_id)
            .await?
            .map(|details| details.is_doctor(&user.id))
            .unwrap_or(false);
        if !owned {
            return Err(NoteGenerationError::NoteNotFound);
        }

        let mut fields = note.fields.clone();
        edit.apply_to(&mut fields);

        let updated = self
            .notes
            .update_note(note_id, &fields, editor, Utc::now())
            .await?
            .ok_or(NoteGenerationError::NoteNotFound)?;
        info!("Note {} edited by {}", note_id, editor);
        Ok(updated)
    }

    /// Generates notes from a transcript the doctor supplies. The meeting
    /// status is left alone.
    pub async fn generate_from_transcript(
        &self,
        user: &User,
        request: GenerateNotesRequest,
    ) -> Result<ManualNotes, NoteGenerationError> {
        let owned = self
            .meetings
            .find_meeting(request.meeting_id)
            .await?
            .filter(|details| details.is_doctor(&user.id))
            .is_some();
        if !owned {
            return Err(NoteGenerationError::MeetingNotFound);
        }

        let completer = self
            .completer
            .as_ref()
            .ok_or(NoteGenerationError::NotConfigured)?;
        if request.transcript.trim().is_empty() {
            return Err(NoteGenerationError::ValidationError(
                "Transcript is required".to_string(),
            ));
        }

        let prompt = prompt::manual_notes_prompt(&request.transcript);
        let raw = completer
            .complete(&prompt, MANUAL_NOTES_MAX_TOKENS)
            .await?
            .trim()
            .to_string();

        match parser::parse_clinical_notes(&raw) {
            Ok(fields) => {
                let note = self
                    .notes
                    .insert_note(NewCallNote {
                        meeting_id: request.meeting_id,
                        fields,
                        ai_metadata: json!({ "raw_response": raw, "parsed": true }),
                    })
                    .await?;
                Ok(ManualNotes::Parsed(note))
            }
            Err(e) => {
                warn!("Manual notes for meeting {} were not JSON: {}", request.meeting_id, e);
                let note = self
                    .notes
                    .insert_note(NewCallNote {
                        meeting_id: request.meeting_id,
                        fields: ClinicalNoteFields {
                            chief_complaint: parser::truncate_chars(&raw, MANUAL_PREVIEW_CHARS),
                            ..Default::default()
                        },
                        ai_metadata: json!({ "raw_response": raw, "parsed": false }),
                    })
                    .await?;
                Ok(ManualNotes::Raw { note, raw })
            }
        }
    }
}
