use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use video_conferencing_cell::{video_conferencing_routes, TwilioTokenIssuer};

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_video_health_check_not_configured() {
    let mut config = TestConfig::default().to_app_config();
    config.twilio_account_sid = String::new();
    let issuer = Arc::new(TwilioTokenIssuer::new(&config));

    let app = video_conferencing_routes(Arc::new(config), issuer);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "not_configured");
    assert_eq!(json["video_configured"], false);
}

#[tokio::test]
async fn test_token_requires_authentication() {
    let config = TestConfig::default();
    let issuer = Arc::new(TwilioTokenIssuer::new(&config.to_app_config()));

    let app = video_conferencing_routes(config.to_arc(), issuer);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/token?room=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_issued_for_caller() {
    let config = TestConfig::default();
    let issuer = Arc::new(TwilioTokenIssuer::new(&config.to_app_config()));
    let user = TestUser::doctor("dr.grey@example.com");
    let jwt = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let app = video_conferencing_routes(config.to_arc(), issuer);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/token?room=meeting-42")
                .header("Authorization", format!("Bearer {}", jwt))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["roomName"], "meeting-42");
    assert!(json["identity"]
        .as_str()
        .unwrap()
        .starts_with("dr_grey_example_com_"));
    assert_eq!(json["token"].as_str().unwrap().split('.').count(), 3);
}
