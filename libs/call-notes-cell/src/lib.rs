//! # Call Notes Cell
//!
//! Turns a consultation recording into structured clinical notes: upload the
//! audio for speaker-labelled transcription, ask the LLM for a JSON summary,
//! store the note and close the meeting in one write, then tell the doctor.
//!
//! Transcription and the LLM are optional. Without them a call still closes,
//! just without a transcript or a note.
//!
//! ## API Endpoints
//!
//! - `POST /notes/meetings/{id}/recording` - Upload the call recording (`audio` or `recording` field)
//! - `POST /notes/generate` - Generate notes from a pasted transcript (doctors)
//! - `GET /notes` - The calling doctor's notes, newest first
//! - `PUT /notes/{id}` - Edit a note

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    NoteGenerationError, PipelineOutcome, PipelineReport, PollConfig, TranscriptJob,
    TranscriptStatus, Utterance,
};
pub use router::{call_notes_routes, NotesState};
pub use services::completion::{CompletionProvider, GroqClient};
pub use services::notes::NoteService;
pub use services::pipeline::NoteGenerationPipeline;
pub use services::transcription::{AssemblyAiClient, TranscriptionProvider};
