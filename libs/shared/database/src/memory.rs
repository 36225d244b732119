//! Process-local gateway. Backs `PERSISTENCE_BACKEND=memory` and the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use shared_models::call_note::{CallNote, ClinicalNoteFields, NewCallNote};
use shared_models::meeting::{
    ConsentStatus, Meeting, MeetingChanges, MeetingDetails, MeetingStatus, NewMeeting,
    RecordingConsent,
};
use shared_models::notification::{NewNotification, Notification, NotificationKind};
use shared_models::profile::{DoctorProfile, Participant, PatientProfile};
use shared_models::qr::{DoctorPatientLink, NewQrToken, QrToken};

use crate::repository::{
    CallNoteRepository, MeetingFilter, MeetingRepository, NotificationRepository,
    ProfileRepository, QrTokenRepository,
};

#[derive(Default)]
struct Tables {
    doctors: HashMap<Uuid, DoctorProfile>,
    patients: HashMap<Uuid, PatientProfile>,
    meetings: HashMap<Uuid, Meeting>,
    notes: Vec<CallNote>,
    notifications: Vec<Notification>,
    tokens: Vec<QrToken>,
    links: Vec<DoctorPatientLink>,
    consents: Vec<RecordingConsent>,
}

impl Tables {
    fn details(&self, meeting: &Meeting) -> Option<MeetingDetails> {
        let doctor = self.doctors.get(&meeting.doctor_id)?;
        let patient = meeting
            .patient_id
            .and_then(|id| self.patients.get(&id))
            .map(Participant::from);
        Some(MeetingDetails {
            meeting: meeting.clone(),
            doctor: Participant::from(doctor),
            patient,
        })
    }

    fn scheduled_where(&self, keep: impl Fn(DateTime<Utc>) -> bool) -> Vec<MeetingDetails> {
        self.meetings
            .values()
            .filter(|m| m.status == MeetingStatus::Scheduled)
            .filter(|m| m.scheduled_at.map(&keep).unwrap_or(false))
            .filter_map(|m| self.details(m))
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryGateway {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    rejected_recipients: Mutex<HashSet<Uuid>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("Persistence gateway unavailable");
        }
        self.tables
            .lock()
            .map_err(|_| anyhow!("In-memory tables poisoned"))
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Notification inserts for this user fail from now on.
    pub fn reject_notifications_for(&self, user_id: Uuid) {
        if let Ok(mut rejected) = self.rejected_recipients.lock() {
            rejected.insert(user_id);
        }
    }

    pub fn add_doctor(&self, name: &str) -> Result<DoctorProfile> {
        let doctor = DoctorProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            specialty: None,
            avatar_url: None,
        };
        self.tables()?.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    pub fn add_patient(&self, name: &str) -> Result<PatientProfile> {
        let patient = PatientProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.tables()?.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    /// Inserts a meeting row verbatim, bypassing lifecycle rules.
    pub fn put_meeting(&self, meeting: Meeting) -> Result<()> {
        self.tables()?.meetings.insert(meeting.id, meeting);
        Ok(())
    }

    pub fn put_token(&self, token: QrToken) -> Result<()> {
        self.tables()?.tokens.push(token);
        Ok(())
    }

    pub fn meeting(&self, meeting_id: Uuid) -> Option<Meeting> {
        self.tables().ok()?.meetings.get(&meeting_id).cloned()
    }

    pub fn notes(&self) -> Vec<CallNote> {
        self.tables().map(|t| t.notes.clone()).unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.tables()
            .map(|t| t.notifications.clone())
            .unwrap_or_default()
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }

    pub fn links(&self) -> Vec<DoctorPatientLink> {
        self.tables().map(|t| t.links.clone()).unwrap_or_default()
    }
}

fn note_from(note: NewCallNote) -> CallNote {
    CallNote {
        id: Uuid::new_v4(),
        meeting_id: note.meeting_id,
        fields: note.fields,
        ai_metadata: note.ai_metadata,
        is_edited: false,
        edited_by: None,
        edited_at: None,
        created_at: Utc::now(),
    }
}

fn newest_first<T>(mut rows: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

#[async_trait]
impl MeetingRepository for InMemoryGateway {
    async fn find_meeting(&self, meeting_id: Uuid) -> Result<Option<MeetingDetails>> {
        let tables = self.tables()?;
        Ok(tables
            .meetings
            .get(&meeting_id)
            .and_then(|m| tables.details(m)))
    }

    async fn list_meetings(&self, filter: MeetingFilter) -> Result<Vec<MeetingDetails>> {
        let tables = self.tables()?;
        let rows = tables
            .meetings
            .values()
            .filter(|m| match filter {
                MeetingFilter::Doctor(id) => m.doctor_id == id,
                MeetingFilter::Patient(id) => m.patient_id == Some(id),
            })
            .filter_map(|m| tables.details(m))
            .collect();
        Ok(newest_first(rows, |d: &MeetingDetails| d.meeting.created_at))
    }

    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<Meeting> {
        let mut tables = self.tables()?;
        if !tables.doctors.contains_key(&meeting.doctor_id) {
            bail!("Foreign key violation: doctor {} does not exist", meeting.doctor_id);
        }
        let row = Meeting {
            id: Uuid::new_v4(),
            doctor_id: meeting.doctor_id,
            patient_id: meeting.patient_id,
            title: Some(meeting.title),
            scheduled_at: meeting.scheduled_at,
            started_at: meeting.started_at,
            ended_at: None,
            status: meeting.status,
            transcript_text: None,
            recording_url: None,
            meeting_url: None,
            created_at: Utc::now(),
        };
        tables.meetings.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_meeting(
        &self,
        meeting_id: Uuid,
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>> {
        let mut tables = self.tables()?;
        Ok(tables.meetings.get_mut(&meeting_id).map(|meeting| {
            changes.apply_to(meeting);
            meeting.clone()
        }))
    }

    async fn transition_meeting(
        &self,
        meeting_id: Uuid,
        expected: &[MeetingStatus],
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>> {
        let mut tables = self.tables()?;
        Ok(tables
            .meetings
            .get_mut(&meeting_id)
            .filter(|meeting| expected.contains(&meeting.status))
            .map(|meeting| {
                changes.apply_to(meeting);
                meeting.clone()
            }))
    }

    async fn delete_meeting(&self, meeting_id: Uuid) -> Result<bool> {
        let mut tables = self.tables()?;
        let removed = tables.meetings.remove(&meeting_id).is_some();
        if removed {
            tables.notes.retain(|n| n.meeting_id != meeting_id);
            tables.consents.retain(|c| c.meeting_id != meeting_id);
        }
        Ok(removed)
    }

    async fn find_scheduled_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MeetingDetails>> {
        Ok(self.tables()?.scheduled_where(|at| at < cutoff))
    }

    async fn find_scheduled_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MeetingDetails>> {
        Ok(self.tables()?.scheduled_where(|at| at >= from && at <= to))
    }

    async fn upsert_consent(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
        status: ConsentStatus,
        consented_at: Option<DateTime<Utc>>,
    ) -> Result<RecordingConsent> {
        let mut tables = self.tables()?;
        let consent = RecordingConsent {
            meeting_id,
            user_id,
            status,
            consented_at,
        };
        tables
            .consents
            .retain(|c| !(c.meeting_id == meeting_id && c.user_id == user_id));
        tables.consents.push(consent.clone());
        Ok(consent)
    }

    async fn find_consent(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RecordingConsent>> {
        Ok(self
            .tables()?
            .consents
            .iter()
            .find(|c| c.meeting_id == meeting_id && c.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl CallNoteRepository for InMemoryGateway {
    async fn insert_note(&self, note: NewCallNote) -> Result<CallNote> {
        let mut tables = self.tables()?;
        if !tables.meetings.contains_key(&note.meeting_id) {
            bail!("Foreign key violation: meeting {} does not exist", note.meeting_id);
        }
        let row = note_from(note);
        tables.notes.push(row.clone());
        Ok(row)
    }

    async fn complete_with_note(
        &self,
        meeting_id: Uuid,
        note: NewCallNote,
        ended_at: DateTime<Utc>,
    ) -> Result<CallNote> {
        let mut tables = self.tables()?;
        let meeting = tables
            .meetings
            .get_mut(&meeting_id)
            .ok_or_else(|| anyhow!("Meeting {} does not exist", meeting_id))?;
        if !matches!(
            meeting.status,
            MeetingStatus::Scheduled | MeetingStatus::InProgress | MeetingStatus::TranscriptionFailed
        ) {
            bail!("Meeting {} cannot be completed from {}", meeting_id, meeting.status);
        }
        meeting.status = MeetingStatus::Completed;
        meeting.ended_at.get_or_insert(ended_at);
        let row = note_from(note);
        tables.notes.push(row.clone());
        Ok(row)
    }

    async fn find_note(&self, note_id: Uuid) -> Result<Option<CallNote>> {
        Ok(self
            .tables()?
            .notes
            .iter()
            .find(|n| n.id == note_id)
            .cloned())
    }

    async fn list_notes_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<CallNote>> {
        let tables = self.tables()?;
        let rows = tables
            .notes
            .iter()
            .filter(|n| {
                tables
                    .meetings
                    .get(&n.meeting_id)
                    .map(|m| m.doctor_id == doctor_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(newest_first(rows, |n: &CallNote| n.created_at))
    }

    async fn list_notes_for_meeting(&self, meeting_id: Uuid) -> Result<Vec<CallNote>> {
        let rows = self
            .tables()?
            .notes
            .iter()
            .filter(|n| n.meeting_id == meeting_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |n: &CallNote| n.created_at))
    }

    async fn update_note(
        &self,
        note_id: Uuid,
        fields: &ClinicalNoteFields,
        edited_by: Uuid,
        edited_at: DateTime<Utc>,
    ) -> Result<Option<CallNote>> {
        let mut tables = self.tables()?;
        Ok(tables.notes.iter_mut().find(|n| n.id == note_id).map(|note| {
            note.fields = fields.clone();
            note.is_edited = true;
            note.edited_by = Some(edited_by);
            note.edited_at = Some(edited_at);
            note.clone()
        }))
    }
}

#[async_trait]
impl NotificationRepository for InMemoryGateway {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let rejected = self
            .rejected_recipients
            .lock()
            .map(|r| r.contains(&notification.user_id))
            .unwrap_or(false);
        if rejected {
            bail!("Notification insert rejected for user {}", notification.user_id);
        }
        let row = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            link: notification.link,
            is_read: false,
            created_at: Utc::now(),
        };
        self.tables()?.notifications.push(row.clone());
        Ok(row)
    }

    async fn list_notifications(&self, user_id: Uuid, limit: usize) -> Result<Vec<Notification>> {
        let rows = self
            .tables()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        let mut rows = newest_first(rows, |n: &Notification| n.created_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<usize> {
        Ok(self
            .tables()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count())
    }

    async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables()?;
        match tables
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<usize> {
        let mut tables = self.tables()?;
        let mut updated = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn notification_exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message_contains: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.tables()?.notifications.iter().any(|n| {
            n.user_id == user_id
                && n.kind == kind
                && n.created_at >= since
                && n.message.contains(message_contains)
        }))
    }
}

#[async_trait]
impl QrTokenRepository for InMemoryGateway {
    async fn insert_token(&self, token: NewQrToken) -> Result<QrToken> {
        let mut tables = self.tables()?;
        if tables.tokens.iter().any(|t| t.token == token.token) {
            bail!("Unique violation: token already exists");
        }
        let row = QrToken {
            id: Uuid::new_v4(),
            token: token.token,
            doctor_id: token.doctor_id,
            used: false,
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        tables.tokens.push(row.clone());
        Ok(row)
    }

    async fn find_token(&self, token: &str) -> Result<Option<QrToken>> {
        Ok(self
            .tables()?
            .tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn list_tokens_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<QrToken>> {
        let rows = self
            .tables()?
            .tokens
            .iter()
            .filter(|t| t.doctor_id == doctor_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |t: &QrToken| t.created_at))
    }

    async fn link_with_token(
        &self,
        token_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        source: &str,
    ) -> Result<Option<DoctorPatientLink>> {
        let mut tables = self.tables()?;
        let Some(index) = tables
            .tokens
            .iter()
            .position(|t| t.id == token_id && t.doctor_id == doctor_id && !t.used)
        else {
            return Ok(None);
        };
        if tables
            .links
            .iter()
            .any(|l| l.doctor_id == doctor_id && l.patient_id == patient_id)
        {
            bail!("Unique violation: doctor and patient already linked");
        }

        tables.tokens[index].used = true;
        let link = DoctorPatientLink {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id,
            source: source.to_string(),
            linked_at: Utc::now(),
        };
        tables.links.push(link.clone());
        Ok(Some(link))
    }

    async fn link_exists(&self, doctor_id: Uuid, patient_id: Uuid) -> Result<bool> {
        Ok(self
            .tables()?
            .links
            .iter()
            .any(|l| l.doctor_id == doctor_id && l.patient_id == patient_id))
    }
}

#[async_trait]
impl ProfileRepository for InMemoryGateway {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>> {
        Ok(self.tables()?.doctors.get(&doctor_id).cloned())
    }

    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<DoctorProfile>> {
        Ok(self
            .tables()?
            .doctors
            .values()
            .find(|d| d.user_id == user_id)
            .cloned())
    }

    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<PatientProfile>> {
        Ok(self.tables()?.patients.get(&patient_id).cloned())
    }

    async fn find_patient_by_user(&self, user_id: Uuid) -> Result<Option<PatientProfile>> {
        Ok(self
            .tables()?
            .patients
            .values()
            .find(|p| p.user_id == user_id)
            .cloned())
    }
}

/// Convenience for tests that need a bare meeting row.
pub fn meeting_row(
    doctor_id: Uuid,
    patient_id: Option<Uuid>,
    status: MeetingStatus,
    scheduled_at: Option<DateTime<Utc>>,
) -> Meeting {
    Meeting {
        id: Uuid::new_v4(),
        doctor_id,
        patient_id,
        title: Some("Video Consultation".to_string()),
        scheduled_at,
        started_at: None,
        ended_at: None,
        status,
        transcript_text: None,
        recording_url: None,
        meeting_url: None,
        created_at: Utc::now(),
    }
}
