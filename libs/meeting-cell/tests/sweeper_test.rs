use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::sync::watch;

use meeting_cell::{AppointmentReminderService, MissedMeetingSweeper, SweeperConfig};
use notification_cell::NotificationService;
use shared_database::memory::meeting_row;
use shared_database::InMemoryGateway;
use shared_models::meeting::MeetingStatus;
use shared_models::profile::{DoctorProfile, PatientProfile};

struct Fixture {
    gateway: Arc<InMemoryGateway>,
    sweeper: Arc<MissedMeetingSweeper>,
    doctor: DoctorProfile,
    patient: PatientProfile,
}

fn fixture(config: SweeperConfig) -> Fixture {
    let gateway = Arc::new(InMemoryGateway::new());
    let doctor = gateway.add_doctor("Grey").unwrap();
    let patient = gateway.add_patient("Sam Patel").unwrap();
    let notifier = Arc::new(NotificationService::new(gateway.clone()));
    let reminders =
        AppointmentReminderService::new(gateway.clone(), gateway.clone(), notifier.clone());
    let sweeper = MissedMeetingSweeper::new(gateway.clone(), notifier, config)
        .with_reminders(reminders);

    Fixture {
        gateway,
        sweeper: Arc::new(sweeper),
        doctor,
        patient,
    }
}

fn schedule(f: &Fixture, minutes_from_now: i64, status: MeetingStatus) -> uuid::Uuid {
    let meeting = meeting_row(
        f.doctor.id,
        Some(f.patient.id),
        status,
        Some(Utc::now() + Duration::minutes(minutes_from_now)),
    );
    let id = meeting.id;
    f.gateway.put_meeting(meeting).unwrap();
    id
}

#[tokio::test]
async fn test_stale_meeting_marked_missed_and_both_parties_notified() {
    let f = fixture(SweeperConfig::default());
    let id = schedule(&f, -31, MeetingStatus::Scheduled);

    let report = f.sweeper.tick(Utc::now()).await.unwrap();

    assert_eq!(report.marked_missed, 1);
    assert_eq!(report.notifications_sent, 2);
    assert_eq!(f.gateway.meeting(id).unwrap().status, MeetingStatus::Missed);

    let doctor_inbox = f.gateway.notifications_for(f.doctor.user_id);
    assert_eq!(doctor_inbox.len(), 1);
    assert_eq!(doctor_inbox[0].title, "Missed Appointment");
    assert_eq!(doctor_inbox[0].message, "Appointment with Sam Patel was not attended");
    assert_eq!(doctor_inbox[0].link.as_deref(), Some("/doctor/appointments"));

    let patient_inbox = f.gateway.notifications_for(f.patient.user_id);
    assert_eq!(patient_inbox.len(), 1);
    assert_eq!(
        patient_inbox[0].message,
        "Your appointment with Dr. Grey was not attended"
    );
    assert_eq!(patient_inbox[0].link.as_deref(), Some("/patient/appointments"));
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let f = fixture(SweeperConfig::default());
    schedule(&f, -45, MeetingStatus::Scheduled);

    f.sweeper.tick(Utc::now()).await.unwrap();
    let second = f.sweeper.tick(Utc::now()).await.unwrap();

    assert_eq!(second.stale_found, 0);
    assert_eq!(second.marked_missed, 0);
    assert_eq!(f.gateway.notifications().len(), 2);
}

#[tokio::test]
async fn test_recent_and_running_meetings_are_left_alone() {
    let f = fixture(SweeperConfig::default());
    let recent = schedule(&f, -10, MeetingStatus::Scheduled);
    let running = schedule(&f, -90, MeetingStatus::InProgress);
    let done = schedule(&f, -90, MeetingStatus::Completed);

    let report = f.sweeper.tick(Utc::now()).await.unwrap();

    assert_eq!(report.marked_missed, 0);
    assert_eq!(f.gateway.meeting(recent).unwrap().status, MeetingStatus::Scheduled);
    assert_eq!(f.gateway.meeting(running).unwrap().status, MeetingStatus::InProgress);
    assert_eq!(f.gateway.meeting(done).unwrap().status, MeetingStatus::Completed);
}

#[tokio::test]
async fn test_doctor_only_meeting_notifies_doctor_once() {
    let f = fixture(SweeperConfig::default());
    let meeting = meeting_row(
        f.doctor.id,
        None,
        MeetingStatus::Scheduled,
        Some(Utc::now() - Duration::hours(1)),
    );
    f.gateway.put_meeting(meeting).unwrap();

    let report = f.sweeper.tick(Utc::now()).await.unwrap();

    assert_eq!(report.marked_missed, 1);
    assert_eq!(report.notifications_sent, 1);
    assert_eq!(
        f.gateway.notifications_for(f.doctor.user_id)[0].message,
        "Appointment with patient was not attended"
    );
}

#[tokio::test]
async fn test_failing_recipient_does_not_block_the_other() {
    let f = fixture(SweeperConfig::default());
    let id = schedule(&f, -40, MeetingStatus::Scheduled);
    f.gateway.reject_notifications_for(f.patient.user_id);

    let report = f.sweeper.tick(Utc::now()).await.unwrap();

    assert_eq!(report.marked_missed, 1);
    assert_eq!(report.notifications_sent, 1);
    assert_eq!(f.gateway.meeting(id).unwrap().status, MeetingStatus::Missed);
    assert_eq!(f.gateway.notifications_for(f.doctor.user_id).len(), 1);
}

#[tokio::test]
async fn test_reminders_sent_once_per_window() {
    let f = fixture(SweeperConfig::default());
    schedule(&f, 60, MeetingStatus::Scheduled);

    let first = f.sweeper.tick(Utc::now()).await.unwrap();
    let second = f.sweeper.tick(Utc::now()).await.unwrap();

    assert_eq!(first.reminders_sent, 2);
    assert_eq!(second.reminders_sent, 0);
    let patient_inbox = f.gateway.notifications_for(f.patient.user_id);
    assert_eq!(patient_inbox.len(), 1);
    assert_eq!(patient_inbox[0].title, "Upcoming Appointment Reminder");
    assert!(patient_inbox[0].message.contains("is in 5"));
}

#[tokio::test]
async fn test_reminders_can_be_disabled() {
    let f = fixture(SweeperConfig {
        reminders_enabled: false,
        ..SweeperConfig::default()
    });
    schedule(&f, 60, MeetingStatus::Scheduled);

    let report = f.sweeper.tick(Utc::now()).await.unwrap();

    assert_eq!(report.reminders_sent, 0);
    assert!(f.gateway.notifications().is_empty());
}

#[tokio::test]
async fn test_unavailable_store_fails_tick() {
    let f = fixture(SweeperConfig::default());
    f.gateway.set_unavailable(true);

    assert!(f.sweeper.tick(Utc::now()).await.is_err());
}

#[tokio::test]
async fn test_loop_survives_failed_ticks_and_stops_on_shutdown() {
    let f = fixture(SweeperConfig {
        interval: StdDuration::from_millis(20),
        ..SweeperConfig::default()
    });
    let id = schedule(&f, -60, MeetingStatus::Scheduled);
    f.gateway.set_unavailable(true);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = f.sweeper.clone().spawn(shutdown_rx);

    tokio::time::sleep(StdDuration::from_millis(80)).await;
    f.gateway.set_unavailable(false);

    let mut marked = false;
    for _ in 0..50 {
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        if f.gateway.meeting(id).map(|m| m.status) == Some(MeetingStatus::Missed) {
            marked = true;
            break;
        }
    }
    assert!(marked, "sweeper stopped after a failed tick");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(StdDuration::from_secs(1), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();
}
