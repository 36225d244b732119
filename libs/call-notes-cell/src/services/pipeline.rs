use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use meeting_cell::lifecycle;
use notification_cell::NotificationService;
use shared_database::{CallNoteRepository, MeetingRepository};
use shared_models::auth::User;
use shared_models::call_note::{ClinicalNoteFields, NewCallNote};
use shared_models::meeting::{MeetingChanges, MeetingDetails, MeetingStatus};
use shared_models::notification::{NewNotification, NotificationKind};

use crate::models::{
    AudioUpload, NoteGenerationError, PipelineOutcome, PipelineReport, PollConfig, TranscriptJob,
};
use crate::services::completion::CompletionProvider;
use crate::services::parser::{self, DEGRADED_PREVIEW_CHARS};
use crate::services::prompt::{self, CALL_SUMMARY_MAX_TOKENS};
use crate::services::transcription::{self, TranscriptWait, TranscriptionProvider};

/// Marks a meeting as being processed until dropped.
struct InFlight<'a> {
    meetings: &'a Mutex<HashSet<Uuid>>,
    meeting_id: Uuid,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut meetings) = self.meetings.lock() {
            meetings.remove(&self.meeting_id);
        }
    }
}

/// Recording → transcript → LLM notes → closed meeting.
pub struct NoteGenerationPipeline {
    meetings: Arc<dyn MeetingRepository>,
    notes: Arc<dyn CallNoteRepository>,
    notifier: Arc<NotificationService>,
    transcriber: Option<Arc<dyn TranscriptionProvider>>,
    completer: Option<Arc<dyn CompletionProvider>>,
    poll: PollConfig,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl NoteGenerationPipeline {
    pub fn new(
        meetings: Arc<dyn MeetingRepository>,
        notes: Arc<dyn CallNoteRepository>,
        notifier: Arc<NotificationService>,
        transcriber: Option<Arc<dyn TranscriptionProvider>>,
        completer: Option<Arc<dyn CompletionProvider>>,
    ) -> Self {
        Self {
            meetings,
            notes,
            notifier,
            transcriber,
            completer,
            poll: PollConfig::default(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    fn claim(&self, meeting_id: Uuid) -> Result<InFlight<'_>, NoteGenerationError> {
        let mut meetings = self
            .in_flight
            .lock()
            .map_err(|_| NoteGenerationError::Internal("in-flight set poisoned".to_string()))?;
        if !meetings.insert(meeting_id) {
            return Err(NoteGenerationError::AlreadyProcessing);
        }
        Ok(InFlight {
            meetings: &self.in_flight,
            meeting_id,
        })
    }

    /// Runs the whole pipeline for one uploaded call. Access and status are
    /// checked before anything is written.
    #[instrument(skip(self, user, audio), fields(user = %user.id))]
    pub async fn process(
        &self,
        user: &User,
        meeting_id: Uuid,
        audio: Option<AudioUpload>,
    ) -> Result<PipelineReport, NoteGenerationError> {
        let details = self
            .meetings
            .find_meeting(meeting_id)
            .await?
            .ok_or(NoteGenerationError::MeetingNotFound)?;
        if !details.involves(&user.id) {
            return Err(NoteGenerationError::Unauthorized);
        }
        if !lifecycle::can_transition(details.meeting.status, MeetingStatus::Completed) {
            return Err(NoteGenerationError::InvalidStatus(details.meeting.status));
        }

        let _guard = self.claim(meeting_id)?;
        let ended_at = details.meeting.ended_at.unwrap_or_else(Utc::now);

        let Some(audio) = audio else {
            warn!("No recording uploaded for meeting {}", meeting_id);
            return self
                .finish(&details, ended_at, PipelineOutcome::NoRecording, None)
                .await;
        };

        let Some(transcriber) = self.transcriber.clone() else {
            warn!("Transcription not configured, closing meeting {} without a transcript", meeting_id);
            return self
                .finish(
                    &details,
                    ended_at,
                    PipelineOutcome::TranscriptionSkipped,
                    Some("Recording uploaded but transcription skipped (transcription service not configured)".to_string()),
                )
                .await;
        };

        info!(
            "Transcribing {} bytes for meeting {} ({})",
            audio.bytes.len(),
            meeting_id,
            audio.file_name.as_deref().unwrap_or("unnamed")
        );

        match self
            .transcribe_and_summarize(&details, transcriber.as_ref(), audio, ended_at)
            .await
        {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Note generation failed for meeting {}: {}", meeting_id, e);
                self.finish(
                    &details,
                    ended_at,
                    PipelineOutcome::TranscriptionFailed(e.to_string()),
                    None,
                )
                .await
                .map_err(|_| e)
            }
        }
    }

    async fn transcribe_and_summarize(
        &self,
        details: &MeetingDetails,
        transcriber: &dyn TranscriptionProvider,
        audio: AudioUpload,
        ended_at: DateTime<Utc>,
    ) -> Result<PipelineReport, NoteGenerationError> {
        let meeting_id = details.meeting.id;

        let job = match transcription::transcribe(transcriber, audio.bytes, self.poll).await? {
            TranscriptWait::Completed(job) => job,
            TranscriptWait::TimedOut => {
                return self
                    .finish(
                        details,
                        ended_at,
                        PipelineOutcome::TranscriptionTimedOut,
                        Some("Transcription timeout".to_string()),
                    )
                    .await;
            }
            TranscriptWait::Failed(reason) => {
                error!("Transcription failed for meeting {}: {}", meeting_id, reason);
                return self
                    .finish(details, ended_at, PipelineOutcome::TranscriptionFailed(reason), None)
                    .await;
            }
        };

        let transcript = job.formatted();
        if !job.has_speaker_labels() {
            warn!("No speaker labels for meeting {}, using the plain transcript", meeting_id);
        }
        self.meetings
            .update_meeting(
                meeting_id,
                MeetingChanges {
                    transcript_text: Some(transcript.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let Some(completer) = self.completer.as_ref() else {
            warn!("LLM not configured, skipping notes for meeting {}", meeting_id);
            return self
                .finish(details, ended_at, PipelineOutcome::NotesSkipped, None)
                .await;
        };

        let doctor_name = details.doctor.name.as_str();
        let patient_name = details
            .patient
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or("Patient");
        let prompt = prompt::call_summary_prompt(&transcript, doctor_name, patient_name);

        let raw = match completer.complete(&prompt, CALL_SUMMARY_MAX_TOKENS).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("LLM call failed for meeting {}: {}", meeting_id, e);
                return self
                    .finish(details, ended_at, PipelineOutcome::NotesSkipped, None)
                    .await;
            }
        };
        info!("LLM reply for meeting {} is {} chars", meeting_id, raw.chars().count());

        match parser::parse_clinical_notes(&raw) {
            Ok(fields) => {
                self.store_notes(details, &job, &transcript, raw, fields, ended_at)
                    .await
            }
            Err(e) => {
                warn!("LLM reply for meeting {} was not valid notes JSON: {}", meeting_id, e);
                let note = NewCallNote {
                    meeting_id,
                    fields: ClinicalNoteFields {
                        chief_complaint: parser::truncate_chars(&raw, DEGRADED_PREVIEW_CHARS),
                        ..Default::default()
                    },
                    ai_metadata: json!({
                        "raw_response": raw,
                        "transcript": job.plain_text(),
                        "parsed": false,
                        "error": e.to_string(),
                    }),
                };
                let note = self.notes.complete_with_note(meeting_id, note, ended_at).await?;

                Ok(PipelineReport {
                    meeting_id,
                    status: MeetingStatus::Completed,
                    outcome: PipelineOutcome::NotesDegraded,
                    note: Some(note),
                    message: None,
                })
            }
        }
    }

    async fn store_notes(
        &self,
        details: &MeetingDetails,
        job: &TranscriptJob,
        transcript: &str,
        raw: String,
        fields: ClinicalNoteFields,
        ended_at: DateTime<Utc>,
    ) -> Result<PipelineReport, NoteGenerationError> {
        let meeting_id = details.meeting.id;
        let note = NewCallNote {
            meeting_id,
            fields,
            ai_metadata: json!({
                "raw_response": raw,
                "transcript": transcript,
                "original_transcript": job.plain_text(),
                "parsed": true,
                "has_speaker_labels": job.has_speaker_labels(),
            }),
        };
        let note = self.notes.complete_with_note(meeting_id, note, ended_at).await?;
        info!("Stored note {} for meeting {}", note.id, meeting_id);

        let ready = NewNotification::new(
            details.doctor.user_id,
            NotificationKind::Note,
            "AI Notes Ready",
            format!("Clinical notes for {} are ready", details.patient_name()),
            Some("/doctor/notes".to_string()),
        );
        if let Err(e) = self.notifier.notify(ready).await {
            warn!("Failed to tell the doctor notes are ready for meeting {}: {}", meeting_id, e);
        }

        Ok(PipelineReport {
            meeting_id,
            status: MeetingStatus::Completed,
            outcome: PipelineOutcome::NotesGenerated,
            note: Some(note),
            message: None,
        })
    }

    /// Closes the meeting in the status the outcome implies.
    async fn finish(
        &self,
        details: &MeetingDetails,
        ended_at: DateTime<Utc>,
        outcome: PipelineOutcome,
        message: Option<String>,
    ) -> Result<PipelineReport, NoteGenerationError> {
        let meeting_id = details.meeting.id;
        let status = outcome.final_status();

        self.meetings
            .transition_meeting(
                meeting_id,
                &lifecycle::sources_for(status),
                MeetingChanges::status(status).with_ended_at(ended_at),
            )
            .await?
            .ok_or(NoteGenerationError::InvalidStatus(details.meeting.status))?;

        info!("Meeting {} closed as {} ({:?})", meeting_id, status, outcome);
        Ok(PipelineReport {
            meeting_id,
            status,
            outcome,
            note: None,
            message,
        })
    }
}
