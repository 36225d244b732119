use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_models::call_note::{CallNote, ClinicalNoteFields, NewCallNote};
use shared_models::meeting::{
    ConsentStatus, Meeting, MeetingChanges, MeetingDetails, MeetingStatus, NewMeeting,
    RecordingConsent,
};
use shared_models::notification::{NewNotification, Notification, NotificationKind};
use shared_models::profile::{DoctorProfile, PatientProfile};
use shared_models::qr::{DoctorPatientLink, NewQrToken, QrToken};

/// Whose meetings to list. Both carry a profile id, not a user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingFilter {
    Doctor(Uuid),
    Patient(Uuid),
}

#[async_trait]
pub trait MeetingRepository: Send + Sync {
    async fn find_meeting(&self, meeting_id: Uuid) -> Result<Option<MeetingDetails>>;

    async fn list_meetings(&self, filter: MeetingFilter) -> Result<Vec<MeetingDetails>>;

    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<Meeting>;

    async fn update_meeting(
        &self,
        meeting_id: Uuid,
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>>;

    /// Applies `changes` only while the stored status is one of `expected`.
    /// Returns `None` when the row was missing or its status had moved on.
    async fn transition_meeting(
        &self,
        meeting_id: Uuid,
        expected: &[MeetingStatus],
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>>;

    async fn delete_meeting(&self, meeting_id: Uuid) -> Result<bool>;

    /// Scheduled meetings whose start lies strictly before `cutoff`.
    async fn find_scheduled_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MeetingDetails>>;

    /// Scheduled meetings starting within `[from, to]`.
    async fn find_scheduled_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MeetingDetails>>;

    async fn upsert_consent(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
        status: ConsentStatus,
        consented_at: Option<DateTime<Utc>>,
    ) -> Result<RecordingConsent>;

    async fn find_consent(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RecordingConsent>>;
}

#[async_trait]
pub trait CallNoteRepository: Send + Sync {
    async fn insert_note(&self, note: NewCallNote) -> Result<CallNote>;

    /// Stores the note and closes the meeting (`completed`, `ended_at`) in one
    /// transaction.
    async fn complete_with_note(
        &self,
        meeting_id: Uuid,
        note: NewCallNote,
        ended_at: DateTime<Utc>,
    ) -> Result<CallNote>;

    async fn find_note(&self, note_id: Uuid) -> Result<Option<CallNote>>;

    async fn list_notes_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<CallNote>>;

    async fn list_notes_for_meeting(&self, meeting_id: Uuid) -> Result<Vec<CallNote>>;

    async fn update_note(
        &self,
        note_id: Uuid,
        fields: &ClinicalNoteFields,
        edited_by: Uuid,
        edited_at: DateTime<Utc>,
    ) -> Result<Option<CallNote>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;

    async fn list_notifications(&self, user_id: Uuid, limit: usize) -> Result<Vec<Notification>>;

    async fn count_unread(&self, user_id: Uuid) -> Result<usize>;

    /// Returns false when the notification does not exist or belongs to someone else.
    async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<usize>;

    async fn notification_exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message_contains: &str,
        since: DateTime<Utc>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait QrTokenRepository: Send + Sync {
    async fn insert_token(&self, token: NewQrToken) -> Result<QrToken>;

    async fn find_token(&self, token: &str) -> Result<Option<QrToken>>;

    async fn list_tokens_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<QrToken>>;

    /// Consumes the token and writes the link in one transaction. `None` when
    /// the token was already used. A failed insert leaves the token unused.
    async fn link_with_token(
        &self,
        token_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        source: &str,
    ) -> Result<Option<DoctorPatientLink>>;

    async fn link_exists(&self, doctor_id: Uuid, patient_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>>;

    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<DoctorProfile>>;

    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<PatientProfile>>;

    async fn find_patient_by_user(&self, user_id: Uuid) -> Result<Option<PatientProfile>>;
}
