use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::notes::NoteService;
use crate::services::pipeline::NoteGenerationPipeline;

/// Recordings of a long consultation easily pass axum's 2 MB default.
const MAX_RECORDING_BYTES: usize = 200 * 1024 * 1024;

#[derive(Clone)]
pub struct NotesState {
    pub pipeline: Arc<NoteGenerationPipeline>,
    pub notes: Arc<NoteService>,
}

pub fn call_notes_routes(config: Arc<AppConfig>, state: NotesState) -> Router {
    Router::new()
        .route("/", get(handlers::list_notes))
        .route("/generate", post(handlers::generate_notes))
        .route("/{note_id}", put(handlers::edit_note))
        .route(
            "/meetings/{meeting_id}/recording",
            post(handlers::upload_recording).layer(DefaultBodyLimit::max(MAX_RECORDING_BYTES)),
        )
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
