use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::{
    MeetingRepository, NotificationRepository, QrTokenRepository, SupabaseClient,
    SupabaseGateway,
};
use shared_models::meeting::{MeetingChanges, MeetingStatus};
use shared_utils::test_utils::TestConfig;

fn gateway(server: &MockServer) -> SupabaseGateway {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    SupabaseGateway::new(Arc::new(SupabaseClient::new(&config)))
}

fn meeting_json(id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "doctor_id": Uuid::new_v4(),
        "patient_id": null,
        "title": "Video Consultation",
        "scheduled_at": "2025-01-01T10:00:00Z",
        "started_at": null,
        "ended_at": null,
        "status": status,
        "transcript_text": null,
        "recording_url": null,
        "meeting_url": null,
        "created_at": "2025-01-01T09:00:00Z"
    })
}

#[tokio::test]
async fn test_find_meeting_resolves_embedded_participants() {
    let server = MockServer::start().await;
    let meeting_id = Uuid::new_v4();
    let mut row = meeting_json(meeting_id, "scheduled");
    row["doctor"] = json!({"id": Uuid::new_v4(), "user_id": Uuid::new_v4(), "name": "Grey"});
    row["patient"] = json!({"id": Uuid::new_v4(), "user_id": Uuid::new_v4(), "name": "Sam"});

    Mock::given(method("GET"))
        .and(path("/rest/v1/meetings"))
        .and(query_param("id", format!("eq.{}", meeting_id)))
        .and(header("apikey", "test-service-role-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let details = gateway(&server)
        .find_meeting(meeting_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(details.meeting.id, meeting_id);
    assert_eq!(details.doctor.name, "Grey");
    assert_eq!(details.patient_name(), "Sam");
    assert_eq!(details.meeting_type(), "patient-doctor");
}

#[tokio::test]
async fn test_transition_is_conditional_on_status() {
    let server = MockServer::start().await;
    let meeting_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/meetings"))
        .and(query_param("id", format!("eq.{}", meeting_id)))
        .and(query_param("status", "in.(scheduled)"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({"status": "missed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = gateway(&server)
        .transition_meeting(
            meeting_id,
            &[MeetingStatus::Scheduled],
            MeetingChanges::status(MeetingStatus::Missed),
        )
        .await
        .unwrap();

    assert!(updated.is_none());
}

#[tokio::test]
async fn test_link_with_token_reports_used_token() {
    let server = MockServer::start().await;
    let token_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/link_patient_with_token"))
        .and(body_partial_json(json!({
            "p_token_id": token_id,
            "p_doctor_id": doctor_id,
            "p_patient_id": patient_id,
            "p_source": "qr",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let link = gateway(&server)
        .link_with_token(token_id, doctor_id, patient_id, "qr")
        .await
        .unwrap();

    assert!(link.is_none());
}

#[tokio::test]
async fn test_link_with_token_returns_link_row() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let link_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/link_patient_with_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": link_id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "source": "qr",
            "linked_at": "2025-01-01T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let link = gateway(&server)
        .link_with_token(Uuid::new_v4(), doctor_id, patient_id, "qr")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(link.id, link_id);
    assert_eq!(link.patient_id, patient_id);
}

#[tokio::test]
async fn test_count_unread_counts_rows() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .and(query_param("is_read", "eq.false"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": Uuid::new_v4()}, {"id": Uuid::new_v4()}])),
        )
        .mount(&server)
        .await;

    assert_eq!(gateway(&server).count_unread(user_id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_upstream_error_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/meetings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .find_scheduled_before(Utc::now())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("boom"));
}
