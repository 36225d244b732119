use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use notification_cell::NotificationService;
use shared_database::MeetingRepository;
use shared_models::meeting::{MeetingChanges, MeetingDetails, MeetingStatus};
use shared_models::notification::{NewNotification, NotificationKind};

use crate::models::{MeetingError, SweepReport, SweeperConfig};
use crate::services::lifecycle;
use crate::services::reminders::AppointmentReminderService;

/// Periodically reclassifies scheduled meetings nobody joined as `missed`.
pub struct MissedMeetingSweeper {
    meetings: Arc<dyn MeetingRepository>,
    notifier: Arc<NotificationService>,
    reminders: Option<AppointmentReminderService>,
    config: SweeperConfig,
}

impl MissedMeetingSweeper {
    pub fn new(
        meetings: Arc<dyn MeetingRepository>,
        notifier: Arc<NotificationService>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            meetings,
            notifier,
            reminders: None,
            config,
        }
    }

    pub fn with_reminders(mut self, reminders: AppointmentReminderService) -> Self {
        if self.config.reminders_enabled {
            self.reminders = Some(reminders);
        }
        self
    }

    fn missed_notifications(details: &MeetingDetails) -> Vec<NewNotification> {
        let mut notifications = vec![NewNotification::new(
            details.doctor.user_id,
            NotificationKind::Appointment,
            "Missed Appointment",
            format!("Appointment with {} was not attended", details.patient_name()),
            Some("/doctor/appointments".to_string()),
        )];

        if let Some(patient) = &details.patient {
            notifications.push(NewNotification::new(
                patient.user_id,
                NotificationKind::Appointment,
                "Missed Appointment",
                format!(
                    "Your appointment with Dr. {} was not attended",
                    details.doctor.name
                ),
                Some("/patient/appointments".to_string()),
            ));
        }

        notifications
    }

    /// One sweep. A failure on one meeting is counted and the rest still run;
    /// only a failing stale-meeting query fails the whole tick.
    #[instrument(skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<SweepReport, MeetingError> {
        let cutoff = lifecycle::missed_cutoff(now, self.config.grace);
        let stale = self.meetings.find_scheduled_before(cutoff).await?;

        let mut report = SweepReport {
            stale_found: stale.len(),
            ..Default::default()
        };

        for details in &stale {
            let meeting_id = details.meeting.id;
            let marked = self
                .meetings
                .transition_meeting(
                    meeting_id,
                    &[MeetingStatus::Scheduled],
                    MeetingChanges::status(MeetingStatus::Missed),
                )
                .await;

            match marked {
                Ok(Some(_)) => {
                    report.marked_missed += 1;
                    report.notifications_sent += self
                        .notifier
                        .notify_many(Self::missed_notifications(details))
                        .await;
                    info!("Marked meeting {} as missed", meeting_id);
                }
                Ok(None) => {
                    debug!("Meeting {} changed status before it could be marked missed", meeting_id);
                }
                Err(e) => {
                    report.failures += 1;
                    warn!("Failed to mark meeting {} as missed: {}", meeting_id, e);
                }
            }
        }

        if let Some(reminders) = &self.reminders {
            match reminders.send_due(now).await {
                Ok(sent) => report.reminders_sent = sent,
                Err(e) => {
                    report.failures += 1;
                    warn!("Appointment reminders failed: {}", e);
                }
            }
        }

        Ok(report)
    }

    /// Ticks until `shutdown` flips to true or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Missed-meeting sweeper started (every {:?})",
            self.config.interval
        );
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick(Utc::now()).await {
                        Ok(report) if report.has_activity() => info!(?report, "Sweep finished"),
                        Ok(report) => debug!(?report, "Sweep finished"),
                        Err(e) => error!("Missed-meeting sweep failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Missed-meeting sweeper stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
