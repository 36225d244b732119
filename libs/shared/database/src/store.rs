use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
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
use crate::supabase::{SupabaseClient, MERGE_DUPLICATES};

const MEETING_SELECT: &str =
    "*,doctor:doctors!inner(id,user_id,name),patient:patients(id,user_id,name)";

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: Uuid,
    user_id: Uuid,
    #[serde(default)]
    name: Option<String>,
}

impl From<ProfileRow> for Participant {
    fn from(row: ProfileRow) -> Self {
        Self {
            profile_id: row.id,
            user_id: row.user_id,
            name: row.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MeetingRow {
    #[serde(flatten)]
    meeting: Meeting,
    doctor: ProfileRow,
    patient: Option<ProfileRow>,
}

impl From<MeetingRow> for MeetingDetails {
    fn from(row: MeetingRow) -> Self {
        Self {
            meeting: row.meeting,
            doctor: row.doctor.into(),
            patient: row.patient.map(Into::into),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    urlencoding::encode(&at.to_rfc3339_opts(SecondsFormat::Millis, true)).into_owned()
}

fn status_list(statuses: &[MeetingStatus]) -> String {
    statuses
        .iter()
        .map(MeetingStatus::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// PostgREST-backed implementation of every repository trait.
#[derive(Clone)]
pub struct SupabaseGateway {
    client: Arc<SupabaseClient>,
}

impl SupabaseGateway {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    async fn fetch_meetings(&self, query: &str) -> Result<Vec<MeetingDetails>> {
        let path = format!(
            "/rest/v1/meetings?{}&select={}",
            query,
            urlencoding::encode(MEETING_SELECT)
        );
        let rows: Vec<MeetingRow> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn patch_meetings(&self, query: &str, changes: MeetingChanges) -> Result<Option<Meeting>> {
        let path = format!("/rest/v1/meetings?{}", query);
        let body = serde_json::to_value(&changes)?;
        let rows: Vec<Meeting> = self
            .client
            .request(Method::PATCH, &path, None, Some(body))
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl MeetingRepository for SupabaseGateway {
    async fn find_meeting(&self, meeting_id: Uuid) -> Result<Option<MeetingDetails>> {
        let mut rows = self.fetch_meetings(&format!("id=eq.{}", meeting_id)).await?;
        Ok(rows.pop())
    }

    async fn list_meetings(&self, filter: MeetingFilter) -> Result<Vec<MeetingDetails>> {
        let query = match filter {
            MeetingFilter::Doctor(id) => format!("doctor_id=eq.{}", id),
            MeetingFilter::Patient(id) => format!("patient_id=eq.{}", id),
        };
        self.fetch_meetings(&format!("{}&order=created_at.desc", query))
            .await
    }

    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<Meeting> {
        let body = serde_json::to_value(&meeting)?;
        let rows: Vec<Meeting> = self
            .client
            .request(Method::POST, "/rest/v1/meetings", None, Some(body))
            .await?;
        rows.into_iter()
            .next()
            .context("Meeting insert returned no rows")
    }

    async fn update_meeting(
        &self,
        meeting_id: Uuid,
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>> {
        self.patch_meetings(&format!("id=eq.{}", meeting_id), changes)
            .await
    }

    async fn transition_meeting(
        &self,
        meeting_id: Uuid,
        expected: &[MeetingStatus],
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>> {
        let query = format!(
            "id=eq.{}&status=in.({})",
            meeting_id,
            status_list(expected)
        );
        self.patch_meetings(&query, changes).await
    }

    async fn delete_meeting(&self, meeting_id: Uuid) -> Result<bool> {
        let path = format!("/rest/v1/meetings?id=eq.{}", meeting_id);
        let rows: Vec<Value> = self.client.request(Method::DELETE, &path, None, None).await?;
        Ok(!rows.is_empty())
    }

    async fn find_scheduled_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MeetingDetails>> {
        self.fetch_meetings(&format!(
            "status=eq.scheduled&scheduled_at=lt.{}",
            timestamp(cutoff)
        ))
        .await
    }

    async fn find_scheduled_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MeetingDetails>> {
        self.fetch_meetings(&format!(
            "status=eq.scheduled&scheduled_at=gte.{}&scheduled_at=lte.{}",
            timestamp(from),
            timestamp(to)
        ))
        .await
    }

    async fn upsert_consent(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
        status: ConsentStatus,
        consented_at: Option<DateTime<Utc>>,
    ) -> Result<RecordingConsent> {
        let body = json!({
            "meeting_id": meeting_id,
            "user_id": user_id,
            "status": status,
            "consented_at": consented_at,
        });
        let rows: Vec<RecordingConsent> = self
            .client
            .request_with_prefer(
                Method::POST,
                "/rest/v1/recording_consents?on_conflict=meeting_id,user_id",
                None,
                Some(body),
                MERGE_DUPLICATES,
            )
            .await?;
        rows.into_iter()
            .next()
            .context("Consent upsert returned no rows")
    }

    async fn find_consent(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RecordingConsent>> {
        let path = format!(
            "/rest/v1/recording_consents?meeting_id=eq.{}&user_id=eq.{}",
            meeting_id, user_id
        );
        let rows: Vec<RecordingConsent> =
            self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl CallNoteRepository for SupabaseGateway {
    async fn insert_note(&self, note: NewCallNote) -> Result<CallNote> {
        let body = serde_json::to_value(&note)?;
        let rows: Vec<CallNote> = self
            .client
            .request(Method::POST, "/rest/v1/call_notes", None, Some(body))
            .await?;
        rows.into_iter()
            .next()
            .context("Call note insert returned no rows")
    }

    async fn complete_with_note(
        &self,
        meeting_id: Uuid,
        note: NewCallNote,
        ended_at: DateTime<Utc>,
    ) -> Result<CallNote> {
        debug!("Completing meeting {} with generated note", meeting_id);
        let body = json!({
            "p_meeting_id": meeting_id,
            "p_note": serde_json::to_value(&note)?,
            "p_ended_at": ended_at,
        });
        self.client
            .request(
                Method::POST,
                "/rest/v1/rpc/complete_meeting_with_note",
                None,
                Some(body),
            )
            .await
    }

    async fn find_note(&self, note_id: Uuid) -> Result<Option<CallNote>> {
        let path = format!("/rest/v1/call_notes?id=eq.{}", note_id);
        let rows: Vec<CallNote> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_notes_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<CallNote>> {
        let path = format!(
            "/rest/v1/call_notes?select={}&meetings.doctor_id=eq.{}&order=created_at.desc",
            urlencoding::encode("*,meetings!inner(doctor_id)"),
            doctor_id
        );
        self.client.request(Method::GET, &path, None, None).await
    }

    async fn list_notes_for_meeting(&self, meeting_id: Uuid) -> Result<Vec<CallNote>> {
        let path = format!(
            "/rest/v1/call_notes?meeting_id=eq.{}&order=created_at.desc",
            meeting_id
        );
        self.client.request(Method::GET, &path, None, None).await
    }

    async fn update_note(
        &self,
        note_id: Uuid,
        fields: &ClinicalNoteFields,
        edited_by: Uuid,
        edited_at: DateTime<Utc>,
    ) -> Result<Option<CallNote>> {
        let mut body = serde_json::to_value(fields)?;
        if let Value::Object(map) = &mut body {
            map.insert("is_edited".to_string(), json!(true));
            map.insert("edited_by".to_string(), json!(edited_by));
            map.insert("edited_at".to_string(), json!(edited_at));
        }
        let path = format!("/rest/v1/call_notes?id=eq.{}", note_id);
        let rows: Vec<CallNote> = self
            .client
            .request(Method::PATCH, &path, None, Some(body))
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl NotificationRepository for SupabaseGateway {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let body = serde_json::to_value(&notification)?;
        let rows: Vec<Notification> = self
            .client
            .request(Method::POST, "/rest/v1/notifications", None, Some(body))
            .await?;
        rows.into_iter()
            .next()
            .context("Notification insert returned no rows")
    }

    async fn list_notifications(&self, user_id: Uuid, limit: usize) -> Result<Vec<Notification>> {
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&order=created_at.desc&limit={}",
            user_id, limit
        );
        self.client.request(Method::GET, &path, None, None).await
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<usize> {
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&is_read=eq.false&select=id",
            user_id
        );
        let rows: Vec<Value> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.len())
    }

    async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let path = format!(
            "/rest/v1/notifications?id=eq.{}&user_id=eq.{}",
            notification_id, user_id
        );
        let rows: Vec<Value> = self
            .client
            .request(Method::PATCH, &path, None, Some(json!({"is_read": true})))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<usize> {
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&is_read=eq.false",
            user_id
        );
        let rows: Vec<Value> = self
            .client
            .request(Method::PATCH, &path, None, Some(json!({"is_read": true})))
            .await?;
        Ok(rows.len())
    }

    async fn notification_exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message_contains: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let pattern = urlencoding::encode(&format!("*{}*", message_contains)).into_owned();
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&type=eq.{}&message=like.{}&created_at=gte.{}&select=id&limit=1",
            user_id,
            kind.as_str(),
            pattern,
            timestamp(since)
        );
        let rows: Vec<Value> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl QrTokenRepository for SupabaseGateway {
    async fn insert_token(&self, token: NewQrToken) -> Result<QrToken> {
        let body = serde_json::to_value(&token)?;
        let rows: Vec<QrToken> = self
            .client
            .request(Method::POST, "/rest/v1/qr_tokens", None, Some(body))
            .await?;
        rows.into_iter()
            .next()
            .context("QR token insert returned no rows")
    }

    async fn find_token(&self, token: &str) -> Result<Option<QrToken>> {
        let path = format!(
            "/rest/v1/qr_tokens?token=eq.{}",
            urlencoding::encode(token)
        );
        let rows: Vec<QrToken> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_tokens_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<QrToken>> {
        let path = format!(
            "/rest/v1/qr_tokens?doctor_id=eq.{}&order=created_at.desc",
            doctor_id
        );
        self.client.request(Method::GET, &path, None, None).await
    }

    async fn link_with_token(
        &self,
        token_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        source: &str,
    ) -> Result<Option<DoctorPatientLink>> {
        debug!("Linking patient {} to doctor {} with token {}", patient_id, doctor_id, token_id);
        let body = json!({
            "p_token_id": token_id,
            "p_doctor_id": doctor_id,
            "p_patient_id": patient_id,
            "p_source": source,
        });
        let rows: Vec<DoctorPatientLink> = self
            .client
            .request(
                Method::POST,
                "/rest/v1/rpc/link_patient_with_token",
                None,
                Some(body),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn link_exists(&self, doctor_id: Uuid, patient_id: Uuid) -> Result<bool> {
        let path = format!(
            "/rest/v1/doctor_patient_links?doctor_id=eq.{}&patient_id=eq.{}&select=id",
            doctor_id, patient_id
        );
        let rows: Vec<Value> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl ProfileRepository for SupabaseGateway {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<DoctorProfile> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<DoctorProfile>> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let rows: Vec<DoctorProfile> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<PatientProfile>> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<PatientProfile> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_patient_by_user(&self, user_id: Uuid) -> Result<Option<PatientProfile>> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        let rows: Vec<PatientProfile> = self.client.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }
}
