use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;
use uuid::Uuid;

use notification_cell::{notification_routes, NotificationError, NotificationService};
use shared_database::{InMemoryGateway, NotificationRepository};
use shared_models::notification::{NewNotification, NotificationKind};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn note_for(user_id: Uuid, title: &str) -> NewNotification {
    NewNotification::new(
        user_id,
        NotificationKind::Note,
        title,
        "Clinical notes are ready for review",
        Some("/doctor/notes".to_string()),
    )
}

#[tokio::test]
async fn test_notify_many_continues_past_failing_recipient() {
    let gateway = Arc::new(InMemoryGateway::new());
    let service = NotificationService::new(gateway.clone());
    let (healthy, broken) = (Uuid::new_v4(), Uuid::new_v4());
    gateway.reject_notifications_for(broken);

    let delivered = service
        .notify_many(vec![note_for(broken, "first"), note_for(healthy, "second")])
        .await;

    assert_eq!(delivered, 1);
    assert_eq!(gateway.notifications_for(healthy).len(), 1);
    assert!(gateway.notifications_for(broken).is_empty());
}

#[tokio::test]
async fn test_inbox_and_mark_read() {
    let gateway = Arc::new(InMemoryGateway::new());
    let service = NotificationService::new(gateway.clone());
    let user = Uuid::new_v4();

    let first = service.notify(note_for(user, "one")).await.unwrap();
    service.notify(note_for(user, "two")).await.unwrap();

    let inbox = service.inbox(user).await.unwrap();
    assert_eq!(inbox.notifications.len(), 2);
    assert_eq!(inbox.unread_count, 2);

    service.mark_read(first.id, user).await.unwrap();
    assert_eq!(gateway.count_unread(user).await.unwrap(), 1);

    assert_eq!(service.mark_all_read(user).await.unwrap(), 1);
    assert_eq!(gateway.count_unread(user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_mark_read_of_someone_elses_notification_is_not_found() {
    let gateway = Arc::new(InMemoryGateway::new());
    let service = NotificationService::new(gateway);
    let owner = Uuid::new_v4();
    let notification = service.notify(note_for(owner, "mine")).await.unwrap();

    let result = service.mark_read(notification.id, Uuid::new_v4()).await;

    assert_matches!(result, Err(NotificationError::NotFound));
}

#[tokio::test]
async fn test_inbox_is_capped_at_twenty() {
    let gateway = Arc::new(InMemoryGateway::new());
    let service = NotificationService::new(gateway);
    let user = Uuid::new_v4();
    for i in 0..25 {
        service.notify(note_for(user, &format!("n{}", i))).await.unwrap();
    }

    let inbox = service.inbox(user).await.unwrap();

    assert_eq!(inbox.notifications.len(), 20);
    assert_eq!(inbox.unread_count, 25);
}

#[tokio::test]
async fn test_routes_require_authentication() {
    let config = TestConfig::default();
    let service = Arc::new(NotificationService::new(Arc::new(InMemoryGateway::new())));
    let app = notification_routes(config.to_arc(), service);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_route_returns_inbox_for_caller() {
    let config = TestConfig::default();
    let gateway = Arc::new(InMemoryGateway::new());
    let service = Arc::new(NotificationService::new(gateway.clone()));
    let user = TestUser::patient("pat@example.com");
    let user_id = user.id;
    service.notify(note_for(user_id, "hello")).await.unwrap();
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let app = notification_routes(config.to_arc(), service);
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
    assert_eq!(json["unreadCount"], 1);
    assert_eq!(json["notifications"][0]["title"], "hello");
    assert_eq!(json["notifications"][0]["type"], "note");
}
