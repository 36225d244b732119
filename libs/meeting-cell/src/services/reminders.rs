use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use notification_cell::NotificationService;
use shared_database::{MeetingRepository, NotificationRepository};
use shared_models::meeting::MeetingDetails;
use shared_models::notification::{NewNotification, NotificationKind};

use crate::models::MeetingError;
use crate::services::lifecycle;

const REMINDER_TITLE: &str = "Upcoming Appointment Reminder";

pub struct AppointmentReminderService {
    meetings: Arc<dyn MeetingRepository>,
    notifications: Arc<dyn NotificationRepository>,
    notifier: Arc<NotificationService>,
}

impl AppointmentReminderService {
    pub fn new(
        meetings: Arc<dyn MeetingRepository>,
        notifications: Arc<dyn NotificationRepository>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            meetings,
            notifications,
            notifier,
        }
    }

    fn reminders_for(details: &MeetingDetails, lead: &str) -> Vec<NewNotification> {
        let meeting_id = details.meeting.id;
        let mut reminders = Vec::with_capacity(2);

        if let Some(patient) = &details.patient {
            reminders.push(NewNotification::new(
                patient.user_id,
                NotificationKind::Appointment,
                REMINDER_TITLE,
                format!(
                    "Your appointment with Dr. {} is in {}. Meeting ID: {}",
                    details.doctor.name, lead, meeting_id
                ),
                Some("/patient/appointments".to_string()),
            ));
        }
        reminders.push(NewNotification::new(
            details.doctor.user_id,
            NotificationKind::Appointment,
            REMINDER_TITLE,
            format!(
                "Appointment with {} is in {}. Meeting ID: {}",
                details.patient_name(),
                lead,
                meeting_id
            ),
            Some("/doctor/appointments".to_string()),
        ));

        reminders
    }

    /// Sends reminders for meetings starting in about an hour or about a day.
    /// A meeting already reminded within the last two hours is skipped.
    pub async fn send_due(&self, now: DateTime<Utc>) -> Result<usize, MeetingError> {
        let upcoming = self
            .meetings
            .find_scheduled_between(now, now + Duration::hours(24))
            .await?;

        let mut sent = 0;
        for details in &upcoming {
            let Some(scheduled_at) = details.meeting.scheduled_at else {
                continue;
            };
            let Some(lead) = lifecycle::reminder_lead(scheduled_at - now) else {
                continue;
            };

            let first_recipient = details
                .patient
                .as_ref()
                .map(|p| p.user_id)
                .unwrap_or(details.doctor.user_id);
            let already_sent = self
                .notifications
                .notification_exists_since(
                    first_recipient,
                    NotificationKind::Appointment,
                    &format!("Meeting ID: {}", details.meeting.id),
                    now - Duration::hours(2),
                )
                .await?;
            if already_sent {
                debug!("Reminder for meeting {} already sent", details.meeting.id);
                continue;
            }

            sent += self
                .notifier
                .notify_many(Self::reminders_for(details, &lead))
                .await;
        }

        Ok(sent)
    }
}
