use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use notification_cell::NotificationService;
use shared_database::{MeetingFilter, MeetingRepository, ProfileRepository};
use shared_models::auth::User;
use shared_models::meeting::{
    ConsentStatus, Meeting, MeetingChanges, MeetingDetails, MeetingStatus, NewMeeting,
    RecordingConsent,
};
use shared_models::notification::{NewNotification, NotificationKind};
use shared_models::profile::Participant;
use video_conferencing_cell::VideoTokenIssuer;

use crate::models::{
    CreateMeetingRequest, MeetingError, MeetingSummary, MeetingView, ParticipantEvent,
};
use crate::services::lifecycle;

const DEFAULT_TITLE: &str = "Video Consultation";

fn meeting_link(meeting_id: Uuid) -> Option<String> {
    Some(format!("/meeting/{}", meeting_id))
}

fn appointments_link(participant_is_doctor: bool) -> Option<String> {
    Some(if participant_is_doctor {
        "/doctor/appointments".to_string()
    } else {
        "/patient/appointments".to_string()
    })
}

pub struct MeetingService {
    meetings: Arc<dyn MeetingRepository>,
    profiles: Arc<dyn ProfileRepository>,
    notifier: Arc<NotificationService>,
    video: Arc<dyn VideoTokenIssuer>,
}

impl MeetingService {
    pub fn new(
        meetings: Arc<dyn MeetingRepository>,
        profiles: Arc<dyn ProfileRepository>,
        notifier: Arc<NotificationService>,
        video: Arc<dyn VideoTokenIssuer>,
    ) -> Self {
        Self {
            meetings,
            profiles,
            notifier,
            video,
        }
    }

    /// Loads a meeting the caller takes part in.
    pub async fn load_for(&self, user: &User, meeting_id: Uuid) -> Result<MeetingDetails, MeetingError> {
        let details = self
            .meetings
            .find_meeting(meeting_id)
            .await?
            .ok_or(MeetingError::NotFound)?;

        if !details.involves(&user.id) {
            return Err(MeetingError::Unauthorized);
        }
        Ok(details)
    }

    async fn notify_quietly(&self, notification: NewNotification) {
        let user_id = notification.user_id;
        if let Err(e) = self.notifier.notify(notification).await {
            warn!("Failed to notify user {}: {}", user_id, e);
        }
    }

    #[instrument(skip(self, user, request), fields(doctor = %user.id))]
    pub async fn create_meeting(
        &self,
        user: &User,
        request: CreateMeetingRequest,
    ) -> Result<Meeting, MeetingError> {
        let doctor = self
            .profiles
            .find_doctor_by_user(user.uuid().map_err(|_| MeetingError::Unauthorized)?)
            .await?
            .ok_or(MeetingError::DoctorProfileMissing)?;

        let patient_id = request
            .patient_id
            .ok_or_else(|| MeetingError::ValidationError("Patient ID is required".to_string()))?;
        let patient = self
            .profiles
            .find_patient(patient_id)
            .await?
            .ok_or(MeetingError::PatientNotFound)?;

        let title = request
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let new_meeting = if request.is_immediate {
            NewMeeting {
                doctor_id: doctor.id,
                patient_id: Some(patient.id),
                title,
                scheduled_at: None,
                started_at: Some(Utc::now()),
                status: MeetingStatus::InProgress,
            }
        } else {
            NewMeeting {
                doctor_id: doctor.id,
                patient_id: Some(patient.id),
                title,
                scheduled_at: request.scheduled_at,
                started_at: None,
                status: MeetingStatus::Scheduled,
            }
        };

        let meeting = self.meetings.insert_meeting(new_meeting).await?;
        info!("Created meeting {} ({})", meeting.id, meeting.status);

        let notification = if request.is_immediate {
            NewNotification::new(
                patient.user_id,
                NotificationKind::Call,
                "Incoming Call",
                format!("Dr. {} is calling you. Click to join the video call.", doctor.name),
                meeting_link(meeting.id),
            )
        } else {
            NewNotification::new(
                patient.user_id,
                NotificationKind::Appointment,
                "New Appointment Scheduled",
                format!("Dr. {} scheduled a video consultation with you.", doctor.name),
                meeting_link(meeting.id),
            )
        };
        self.notify_quietly(notification).await;

        Ok(meeting)
    }

    pub async fn get_meeting(&self, user: &User, meeting_id: Uuid) -> Result<MeetingView, MeetingError> {
        let details = self.load_for(user, meeting_id).await?;

        let has_consented = match user.uuid() {
            Ok(user_id) => self
                .meetings
                .find_consent(meeting_id, user_id)
                .await?
                .map(|c| c.status == ConsentStatus::Granted)
                .unwrap_or(false),
            Err(_) => false,
        };

        let room_name = meeting_id.to_string();
        let identity = user.email.clone().unwrap_or_else(|| user.id.clone());
        let (video_token, video_error) = match self.video.issue_token(&room_name, &identity) {
            Ok(token) => (Some(token.token), None),
            Err(e) => {
                warn!("Video token generation failed for meeting {}: {}", meeting_id, e);
                (None, Some(e.to_string()))
            }
        };

        Ok(MeetingView {
            summary: MeetingSummary::from(&details),
            has_consented,
            is_recording: details.meeting.status == MeetingStatus::InProgress,
            recording_enabled: true,
            room_name,
            video_token,
            video_error,
        })
    }

    pub async fn list_meetings(&self, user: &User) -> Result<Vec<MeetingSummary>, MeetingError> {
        let user_id = user.uuid().map_err(|_| MeetingError::Unauthorized)?;

        let filter = if user.is_doctor() {
            self.profiles
                .find_doctor_by_user(user_id)
                .await?
                .map(|d| MeetingFilter::Doctor(d.id))
        } else if user.is_patient() {
            self.profiles
                .find_patient_by_user(user_id)
                .await?
                .map(|p| MeetingFilter::Patient(p.id))
        } else {
            return Err(MeetingError::Unauthorized);
        };

        let Some(filter) = filter else {
            return Ok(Vec::new());
        };

        let meetings = self.meetings.list_meetings(filter).await?;
        Ok(meetings.iter().map(MeetingSummary::from).collect())
    }

    pub async fn start_recording(&self, user: &User, meeting_id: Uuid) -> Result<Meeting, MeetingError> {
        let details = self.load_for(user, meeting_id).await?;
        let meeting = details.meeting;

        if meeting.status == MeetingStatus::InProgress && meeting.started_at.is_some() {
            return Ok(meeting);
        }
        if meeting.status != MeetingStatus::InProgress {
            lifecycle::validate_transition(meeting.status, MeetingStatus::InProgress)?;
        }

        let changes = MeetingChanges::status(MeetingStatus::InProgress).with_started_at(Utc::now());
        self.meetings
            .transition_meeting(
                meeting_id,
                &[MeetingStatus::Scheduled, MeetingStatus::InProgress],
                changes,
            )
            .await?
            .ok_or(MeetingError::InvalidStatusTransition {
                from: meeting.status,
                to: MeetingStatus::InProgress,
            })
    }

    pub async fn update_consent(
        &self,
        user: &User,
        meeting_id: Uuid,
        status: ConsentStatus,
    ) -> Result<RecordingConsent, MeetingError> {
        self.load_for(user, meeting_id).await?;
        let user_id = user.uuid().map_err(|_| MeetingError::Unauthorized)?;

        let consented_at = (status == ConsentStatus::Granted).then(Utc::now);
        Ok(self
            .meetings
            .upsert_consent(meeting_id, user_id, status, consented_at)
            .await?)
    }

    /// Tells the other side of the call that someone joined or left.
    pub async fn participant_event(
        &self,
        user: &User,
        meeting_id: Uuid,
        event: ParticipantEvent,
        participant_name: Option<String>,
    ) -> Result<(), MeetingError> {
        let details = self.load_for(user, meeting_id).await?;
        let name = participant_name.unwrap_or_else(|| user.display_name());

        let other: Option<&Participant> = if details.is_doctor(&user.id) {
            details.patient.as_ref()
        } else {
            Some(&details.doctor)
        };
        let Some(other) = other else {
            return Ok(());
        };

        let (title, message) = match event {
            ParticipantEvent::Joined => ("Participant Joined", format!("{} has joined the call.", name)),
            ParticipantEvent::Left => ("Participant Left", format!("{} has left the call.", name)),
        };

        self.notifier
            .notify(NewNotification::new(
                other.user_id,
                NotificationKind::Call,
                title,
                message,
                meeting_link(meeting_id),
            ))
            .await
            .map_err(|e| MeetingError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn reschedule(
        &self,
        user: &User,
        meeting_id: Uuid,
        scheduled_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<Meeting, MeetingError> {
        let details = self.load_for(user, meeting_id).await?;
        if !details.is_doctor(&user.id) {
            return Err(MeetingError::Unauthorized);
        }
        let scheduled_at = scheduled_at
            .ok_or_else(|| MeetingError::ValidationError("scheduledAt is required".to_string()))?;

        lifecycle::validate_transition(details.meeting.status, MeetingStatus::Scheduled)?;

        let changes = MeetingChanges {
            status: Some(MeetingStatus::Scheduled),
            scheduled_at: Some(scheduled_at),
            ..Default::default()
        };
        let meeting = self
            .meetings
            .transition_meeting(
                meeting_id,
                &lifecycle::sources_for(MeetingStatus::Scheduled),
                changes,
            )
            .await?
            .ok_or(MeetingError::InvalidStatusTransition {
                from: MeetingStatus::InProgress,
                to: MeetingStatus::Scheduled,
            })?;

        if let Some(patient) = &details.patient {
            self.notify_quietly(NewNotification::new(
                patient.user_id,
                NotificationKind::Appointment,
                "Appointment Rescheduled",
                format!(
                    "Your appointment with Dr. {} has been rescheduled",
                    details.doctor.name
                ),
                appointments_link(false),
            ))
            .await;
        }

        Ok(meeting)
    }

    pub async fn cancel(&self, user: &User, meeting_id: Uuid) -> Result<Meeting, MeetingError> {
        let details = self.load_for(user, meeting_id).await?;
        lifecycle::validate_transition(details.meeting.status, MeetingStatus::Cancelled)?;

        let meeting = self
            .meetings
            .transition_meeting(
                meeting_id,
                &[MeetingStatus::Scheduled],
                MeetingChanges::status(MeetingStatus::Cancelled),
            )
            .await?
            .ok_or(MeetingError::InvalidStatusTransition {
                from: details.meeting.status,
                to: MeetingStatus::Cancelled,
            })?;

        let cancelled_by_doctor = details.is_doctor(&user.id);
        let other = if cancelled_by_doctor {
            details.patient.as_ref()
        } else {
            Some(&details.doctor)
        };
        if let Some(other) = other {
            let canceller = if cancelled_by_doctor {
                format!("Dr. {}", details.doctor.name)
            } else {
                details.patient_name().to_string()
            };
            self.notify_quietly(NewNotification::new(
                other.user_id,
                NotificationKind::Appointment,
                "Appointment Cancelled",
                format!("{} cancelled the appointment", canceller),
                appointments_link(!cancelled_by_doctor),
            ))
            .await;
        }

        Ok(meeting)
    }

    pub async fn delete(&self, user: &User, meeting_id: Uuid) -> Result<(), MeetingError> {
        let details = self.load_for(user, meeting_id).await?;
        if !details.is_doctor(&user.id) {
            return Err(MeetingError::Unauthorized);
        }

        if self.meetings.delete_meeting(meeting_id).await? {
            info!("Deleted meeting {}", meeting_id);
            Ok(())
        } else {
            Err(MeetingError::NotFound)
        }
    }
}
