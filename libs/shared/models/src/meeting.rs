use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::profile::Participant;

// ==============================================================================
// MEETING RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub title: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: MeetingStatus,
    pub transcript_text: Option<String>,
    pub recording_url: Option<String>,
    pub meeting_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Missed,
    TranscriptionFailed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::InProgress => "in_progress",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Cancelled => "cancelled",
            MeetingStatus::Missed => "missed",
            MeetingStatus::TranscriptionFailed => "transcription_failed",
        }
    }

    /// No automated transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MeetingStatus::Completed
                | MeetingStatus::Cancelled
                | MeetingStatus::Missed
                | MeetingStatus::TranscriptionFailed
        )
    }
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeetingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MeetingStatus::Scheduled),
            "in_progress" => Ok(MeetingStatus::InProgress),
            "completed" => Ok(MeetingStatus::Completed),
            "cancelled" => Ok(MeetingStatus::Cancelled),
            "missed" => Ok(MeetingStatus::Missed),
            "transcription_failed" => Ok(MeetingStatus::TranscriptionFailed),
            other => Err(format!("Unknown meeting status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeeting {
    pub doctor_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub title: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub status: MeetingStatus,
}

/// Partial update of a meeting row. Only the `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MeetingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
}

impl MeetingChanges {
    pub fn status(status: MeetingStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_ended_at(mut self, ended_at: DateTime<Utc>) -> Self {
        self.ended_at = Some(ended_at);
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.scheduled_at.is_none()
            && self.started_at.is_none()
            && self.ended_at.is_none()
            && self.transcript_text.is_none()
            && self.recording_url.is_none()
    }

    pub fn apply_to(&self, meeting: &mut Meeting) {
        if let Some(status) = self.status {
            meeting.status = status;
        }
        if let Some(at) = self.scheduled_at {
            meeting.scheduled_at = Some(at);
        }
        if let Some(at) = self.started_at {
            meeting.started_at = Some(at);
        }
        if let Some(at) = self.ended_at {
            meeting.ended_at = Some(at);
        }
        if let Some(text) = &self.transcript_text {
            meeting.transcript_text = Some(text.clone());
        }
        if let Some(url) = &self.recording_url {
            meeting.recording_url = Some(url.clone());
        }
    }
}

/// A meeting together with the resolved doctor and (optional) patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub meeting: Meeting,
    pub doctor: Participant,
    pub patient: Option<Participant>,
}

/// Token subjects are compared as parsed ids, so hex case does not matter.
fn same_user(user_id: &str, id: Uuid) -> bool {
    Uuid::parse_str(user_id)
        .map(|parsed| parsed == id)
        .unwrap_or(false)
}

impl MeetingDetails {
    pub fn is_doctor(&self, user_id: &str) -> bool {
        same_user(user_id, self.doctor.user_id)
    }

    pub fn is_patient(&self, user_id: &str) -> bool {
        self.patient
            .as_ref()
            .map(|p| same_user(user_id, p.user_id))
            .unwrap_or(false)
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.is_doctor(user_id) || self.is_patient(user_id)
    }

    pub fn patient_name(&self) -> &str {
        self.patient.as_ref().map(|p| p.name.as_str()).unwrap_or("patient")
    }

    /// "doctor-doctor" meetings carry no patient reference.
    pub fn meeting_type(&self) -> &'static str {
        if self.patient.is_none() {
            "doctor-doctor"
        } else {
            "patient-doctor"
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Pending,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConsent {
    pub meeting_id: Uuid,
    pub user_id: Uuid,
    pub status: ConsentStatus,
    pub consented_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_value(MeetingStatus::TranscriptionFailed).unwrap(),
            json!("transcription_failed")
        );
        assert_eq!(
            "in_progress".parse::<MeetingStatus>().unwrap(),
            MeetingStatus::InProgress
        );
        assert!("transcription_completed".parse::<MeetingStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!MeetingStatus::Scheduled.is_terminal());
        assert!(!MeetingStatus::InProgress.is_terminal());
        assert!(MeetingStatus::Completed.is_terminal());
        assert!(MeetingStatus::Missed.is_terminal());
        assert!(MeetingStatus::TranscriptionFailed.is_terminal());
    }

    #[test]
    fn test_changes_only_serialize_present_fields() {
        let changes = MeetingChanges::status(MeetingStatus::Missed);
        assert_eq!(serde_json::to_value(&changes).unwrap(), json!({"status": "missed"}));
        assert!(MeetingChanges::default().is_empty());
    }

    fn details(patient: Option<Participant>) -> MeetingDetails {
        let doctor = Participant {
            profile_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Grey".to_string(),
        };
        MeetingDetails {
            meeting: Meeting {
                id: Uuid::new_v4(),
                doctor_id: doctor.profile_id,
                patient_id: patient.as_ref().map(|p| p.profile_id),
                title: None,
                scheduled_at: None,
                started_at: None,
                ended_at: None,
                status: MeetingStatus::Scheduled,
                transcript_text: None,
                recording_url: None,
                meeting_url: None,
                created_at: Utc::now(),
            },
            doctor,
            patient,
        }
    }

    #[test]
    fn test_participant_match_ignores_subject_case() {
        let patient = Participant {
            profile_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Sam Patel".to_string(),
        };
        let details = details(Some(patient.clone()));

        let doctor_sub = details.doctor.user_id.to_string().to_uppercase();
        assert!(details.is_doctor(&doctor_sub));
        assert!(!details.is_patient(&doctor_sub));
        assert!(details.involves(&patient.user_id.to_string().to_uppercase()));
        assert!(!details.involves(&Uuid::new_v4().to_string()));
        assert!(!details.involves("not-a-uuid"));
    }

    #[test]
    fn test_doctor_only_meeting_has_no_patient() {
        let details = details(None);

        assert!(!details.is_patient(&details.doctor.user_id.to_string()));
        assert_eq!(details.meeting_type(), "doctor-doctor");
    }
}
