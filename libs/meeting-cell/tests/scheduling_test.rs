use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;

use meeting_cell::models::{CreateMeetingRequest, ParticipantEvent};
use meeting_cell::{meeting_routes, MeetingError, MeetingService};
use notification_cell::NotificationService;
use shared_database::InMemoryGateway;
use shared_models::auth::User;
use shared_models::meeting::{ConsentStatus, MeetingStatus};
use shared_models::notification::NotificationKind;
use shared_models::profile::{DoctorProfile, PatientProfile};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use video_conferencing_cell::TwilioTokenIssuer;

struct Fixture {
    gateway: Arc<InMemoryGateway>,
    service: Arc<MeetingService>,
    doctor: DoctorProfile,
    patient: PatientProfile,
}

fn fixture_with(config: &shared_config::AppConfig) -> Fixture {
    let gateway = Arc::new(InMemoryGateway::new());
    let doctor = gateway.add_doctor("Grey").unwrap();
    let patient = gateway.add_patient("Sam Patel").unwrap();
    let notifier = Arc::new(NotificationService::new(gateway.clone()));
    let service = Arc::new(MeetingService::new(
        gateway.clone(),
        gateway.clone(),
        notifier,
        Arc::new(TwilioTokenIssuer::new(config)),
    ));

    Fixture {
        gateway,
        service,
        doctor,
        patient,
    }
}

fn fixture() -> Fixture {
    fixture_with(&TestConfig::default().to_app_config())
}

fn doctor_user(f: &Fixture) -> User {
    TestUser::with_id(f.doctor.user_id, "grey@example.com", "doctor").to_user()
}

fn patient_user(f: &Fixture) -> User {
    TestUser::with_id(f.patient.user_id, "sam@example.com", "patient").to_user()
}

fn request(f: &Fixture, immediate: bool) -> CreateMeetingRequest {
    CreateMeetingRequest {
        patient_id: Some(f.patient.id),
        title: None,
        scheduled_at: (!immediate).then(|| Utc::now() + Duration::days(1)),
        is_immediate: immediate,
    }
}

#[tokio::test]
async fn test_immediate_call_starts_in_progress_and_rings_patient() {
    let f = fixture();

    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, true))
        .await
        .unwrap();

    assert_eq!(meeting.status, MeetingStatus::InProgress);
    assert!(meeting.scheduled_at.is_none());
    assert_eq!(meeting.title.as_deref(), Some("Video Consultation"));

    let inbox = f.gateway.notifications_for(f.patient.user_id);
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Call);
    assert_eq!(inbox[0].title, "Incoming Call");
    assert_eq!(inbox[0].link, Some(format!("/meeting/{}", meeting.id)));
}

#[tokio::test]
async fn test_scheduled_meeting_notifies_appointment() {
    let f = fixture();

    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, false))
        .await
        .unwrap();

    assert_eq!(meeting.status, MeetingStatus::Scheduled);
    let inbox = f.gateway.notifications_for(f.patient.user_id);
    assert_eq!(inbox[0].kind, NotificationKind::Appointment);
    assert_eq!(inbox[0].title, "New Appointment Scheduled");
}

#[tokio::test]
async fn test_create_requires_patient() {
    let f = fixture();
    let mut req = request(&f, false);
    req.patient_id = None;

    let result = f.service.create_meeting(&doctor_user(&f), req).await;
    assert_matches!(result, Err(MeetingError::ValidationError(_)));

    let mut req = request(&f, false);
    req.patient_id = Some(uuid::Uuid::new_v4());
    let result = f.service.create_meeting(&doctor_user(&f), req).await;
    assert_matches!(result, Err(MeetingError::PatientNotFound));
}

#[tokio::test]
async fn test_get_meeting_includes_video_token() {
    let f = fixture();
    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, false))
        .await
        .unwrap();

    let view = f
        .service
        .get_meeting(&patient_user(&f), meeting.id)
        .await
        .unwrap();

    assert_eq!(view.room_name, meeting.id.to_string());
    assert!(view.video_token.is_some());
    assert!(view.video_error.is_none());
    assert_eq!(view.summary.meeting_type, "patient-doctor");
    assert!(!view.has_consented);
}

#[tokio::test]
async fn test_video_failure_is_reported_in_band() {
    let mut config = TestConfig::default().to_app_config();
    config.twilio_api_key = String::new();
    let f = fixture_with(&config);
    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, true))
        .await
        .unwrap();

    let view = f
        .service
        .get_meeting(&doctor_user(&f), meeting.id)
        .await
        .unwrap();

    assert!(view.video_token.is_none());
    assert_eq!(view.video_error.as_deref(), Some("Video conferencing not configured"));
}

#[tokio::test]
async fn test_outsider_cannot_see_meeting() {
    let f = fixture();
    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, false))
        .await
        .unwrap();
    let outsider = TestUser::patient("other@example.com").to_user();

    let result = f.service.get_meeting(&outsider, meeting.id).await;

    assert_matches!(result, Err(MeetingError::Unauthorized));
}

#[tokio::test]
async fn test_consent_and_start_recording() {
    let f = fixture();
    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, false))
        .await
        .unwrap();
    let patient = patient_user(&f);

    let consent = f
        .service
        .update_consent(&patient, meeting.id, ConsentStatus::Granted)
        .await
        .unwrap();
    assert!(consent.consented_at.is_some());

    let started = f
        .service
        .start_recording(&doctor_user(&f), meeting.id)
        .await
        .unwrap();
    assert_eq!(started.status, MeetingStatus::InProgress);
    assert!(started.started_at.is_some());

    let view = f.service.get_meeting(&patient, meeting.id).await.unwrap();
    assert!(view.has_consented);
    assert!(view.is_recording);
}

#[tokio::test]
async fn test_cancel_only_from_scheduled() {
    let f = fixture();
    let doctor = doctor_user(&f);
    let meeting = f
        .service
        .create_meeting(&doctor, request(&f, true))
        .await
        .unwrap();

    let result = f.service.cancel(&doctor, meeting.id).await;

    assert_matches!(
        result,
        Err(MeetingError::InvalidStatusTransition {
            from: MeetingStatus::InProgress,
            to: MeetingStatus::Cancelled
        })
    );
}

#[tokio::test]
async fn test_patient_cancel_notifies_doctor() {
    let f = fixture();
    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, false))
        .await
        .unwrap();

    let cancelled = f.service.cancel(&patient_user(&f), meeting.id).await.unwrap();

    assert_eq!(cancelled.status, MeetingStatus::Cancelled);
    let inbox = f.gateway.notifications_for(f.doctor.user_id);
    assert_eq!(inbox[0].title, "Appointment Cancelled");
    assert_eq!(inbox[0].message, "Sam Patel cancelled the appointment");
}

#[tokio::test]
async fn test_reschedule_revives_missed_meeting() {
    let f = fixture();
    let doctor = doctor_user(&f);
    let meeting = f
        .service
        .create_meeting(&doctor, request(&f, false))
        .await
        .unwrap();
    let mut stored = f.gateway.meeting(meeting.id).unwrap();
    stored.status = MeetingStatus::Missed;
    f.gateway.put_meeting(stored).unwrap();

    let missing = f.service.reschedule(&doctor, meeting.id, None).await;
    assert_matches!(missing, Err(MeetingError::ValidationError(_)));

    let new_time = Utc::now() + Duration::days(2);
    let rescheduled = f
        .service
        .reschedule(&doctor, meeting.id, Some(new_time))
        .await
        .unwrap();

    assert_eq!(rescheduled.status, MeetingStatus::Scheduled);
    assert_eq!(rescheduled.scheduled_at, Some(new_time));
    let inbox = f.gateway.notifications_for(f.patient.user_id);
    assert!(inbox.iter().any(|n| n.title == "Appointment Rescheduled"));
}

#[tokio::test]
async fn test_participant_event_notifies_other_party() {
    let f = fixture();
    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, true))
        .await
        .unwrap();

    f.service
        .participant_event(&patient_user(&f), meeting.id, ParticipantEvent::Joined, None)
        .await
        .unwrap();

    let inbox = f.gateway.notifications_for(f.doctor.user_id);
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "Participant Joined");
    assert_eq!(inbox[0].message, "sam@example.com has joined the call.");
}

#[tokio::test]
async fn test_only_owning_doctor_deletes() {
    let f = fixture();
    let meeting = f
        .service
        .create_meeting(&doctor_user(&f), request(&f, false))
        .await
        .unwrap();

    let by_patient = f.service.delete(&patient_user(&f), meeting.id).await;
    assert_matches!(by_patient, Err(MeetingError::Unauthorized));

    f.service.delete(&doctor_user(&f), meeting.id).await.unwrap();
    assert!(f.gateway.meeting(meeting.id).is_none());
}

#[tokio::test]
async fn test_patients_cannot_create_meetings_over_http() {
    let config = TestConfig::default();
    let f = fixture();
    let token = JwtTestUtils::create_test_token(
        &TestUser::with_id(f.patient.user_id, "sam@example.com", "patient"),
        &config.jwt_secret,
        None,
    );

    let app = meeting_routes(config.to_arc(), f.service.clone());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"patientId": f.patient.id}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_meetings_over_http() {
    let config = TestConfig::default();
    let f = fixture();
    f.service
        .create_meeting(&doctor_user(&f), request(&f, false))
        .await
        .unwrap();
    let token = JwtTestUtils::create_test_token(
        &TestUser::with_id(f.doctor.user_id, "grey@example.com", "doctor"),
        &config.jwt_secret,
        None,
    );

    let app = meeting_routes(config.to_arc(), f.service.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["meetings"][0]["patientName"], "Sam Patel");
    assert_eq!(json["meetings"][0]["status"], "scheduled");
}
