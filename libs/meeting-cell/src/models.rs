use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::meeting::{ConsentStatus, MeetingDetails, MeetingStatus};

// ==============================================================================
// REQUEST DTOs
// ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    pub patient_id: Option<Uuid>,
    pub title: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_immediate: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleMeetingRequest {
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    pub status: ConsentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantEvent {
    Joined,
    Left,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantEventRequest {
    pub event: ParticipantEvent,
    pub participant_name: Option<String>,
}

// ==============================================================================
// RESPONSE DTOs
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub doctor_name: String,
    pub patient_name: Option<String>,
    pub status: MeetingStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub meeting_type: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<&MeetingDetails> for MeetingSummary {
    fn from(details: &MeetingDetails) -> Self {
        let meeting = &details.meeting;
        Self {
            id: meeting.id,
            title: meeting.title.clone(),
            doctor_name: details.doctor.name.clone(),
            patient_name: details.patient.as_ref().map(|p| p.name.clone()),
            status: meeting.status,
            scheduled_at: meeting.scheduled_at,
            started_at: meeting.started_at,
            ended_at: meeting.ended_at,
            meeting_type: details.meeting_type(),
            created_at: meeting.created_at,
        }
    }
}

/// What a participant needs to join the call. Token failures are reported
/// in `video_error` rather than failing the request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingView {
    #[serde(flatten)]
    pub summary: MeetingSummary,
    pub has_consented: bool,
    pub is_recording: bool,
    pub recording_enabled: bool,
    pub room_name: String,
    pub video_token: Option<String>,
    pub video_error: Option<String>,
}

// ==============================================================================
// BACKGROUND RUNNER
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    /// How long past its start a scheduled meeting may sit before it is missed.
    pub grace: chrono::Duration,
    pub reminders_enabled: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            grace: chrono::Duration::minutes(crate::lifecycle::MISSED_GRACE_MINUTES),
            reminders_enabled: true,
        }
    }
}

impl SweeperConfig {
    pub fn with_interval_seconds(seconds: u64) -> Self {
        Self {
            interval: Duration::from_secs(seconds.max(1)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub stale_found: usize,
    pub marked_missed: usize,
    pub notifications_sent: usize,
    pub reminders_sent: usize,
    pub failures: usize,
}

impl SweepReport {
    pub fn has_activity(&self) -> bool {
        self.marked_missed > 0 || self.reminders_sent > 0 || self.failures > 0
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum MeetingError {
    #[error("Meeting not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor profile not found")]
    DoctorProfileMissing,

    #[error("Not authorized for this meeting")]
    Unauthorized,

    #[error("Meeting cannot move from {from} to {to}")]
    InvalidStatusTransition { from: MeetingStatus, to: MeetingStatus },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for MeetingError {
    fn from(err: anyhow::Error) -> Self {
        MeetingError::DatabaseError(err.to_string())
    }
}

impl From<MeetingError> for AppError {
    fn from(err: MeetingError) -> Self {
        match err {
            MeetingError::NotFound | MeetingError::PatientNotFound => {
                AppError::NotFound(err.to_string())
            }
            MeetingError::DoctorProfileMissing | MeetingError::Unauthorized => {
                AppError::Forbidden(err.to_string())
            }
            MeetingError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            MeetingError::ValidationError(msg) => AppError::ValidationError(msg),
            MeetingError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
