//! Integration tests for the webhook router.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{TestBot, SECRET};
use kik_client::{sign, SIGNATURE_HEADER};
use rpchar_bot::server::{create_router_with_throttle, AppState, WebhookThrottle};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

fn webhook_body(from: &str, body: &str) -> String {
    serde_json::json!({
        "messages": [{
            "type": "text",
            "from": from,
            "chatId": format!("chat-{from}"),
            "participants": [from],
            "body": body,
            "id": "6d8d060c-3ae4-46fc-bb18-6e7ba3182c0f",
            "timestamp": 1399303478832_i64
        }]
    })
    .to_string()
}

fn signed_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/incoming")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, sign(SECRET, body.as_bytes()))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let bot = TestBot::new().await;

    let response = bot
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_invalid_signature_is_forbidden() {
    let bot = TestBot::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/message"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&bot.kik)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/incoming")
        .header(SIGNATURE_HEADER, "00FF")
        .body(Body::from(webhook_body("alice", "Liste")))
        .unwrap();
    let response = bot.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_signed_message_is_answered() {
    let bot = TestBot::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/message"))
        .and(body_string_contains("Die Münze zeigt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&bot.kik)
        .await;

    let response = bot
        .router()
        .oneshot(signed_request(webhook_body("alice", "@steckbot Münze")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_spent_quota_asks_kik_to_retry() {
    let bot = TestBot::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/message"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&bot.kik)
        .await;
    let router = create_router_with_throttle(
        AppState::new(Arc::clone(&bot.dispatcher)),
        WebhookThrottle::per_minute(1),
    );

    let response = router
        .clone()
        .oneshot(signed_request(webhook_body("alice", "Münze")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(signed_request(webhook_body("alice", "Münze")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let bot = TestBot::new().await;

    let response = bot
        .router()
        .oneshot(signed_request("{\"messages\": 5}".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_failure_triggers_apology() {
    let bot = TestBot::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/message"))
        .and(body_string_contains("Fehler-Id"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&bot.kik)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/message"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&bot.kik)
        .await;

    let response = bot
        .router()
        .oneshot(signed_request(webhook_body("alice", "Liste")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_debug_endpoint_follows_request_logging() {
    let bot = TestBot::new().await;
    let response = bot
        .router()
        .oneshot(Request::builder().uri("/debug").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let bot = TestBot::with_config(|c| c.log_requests = true).await;
    Mock::given(method("POST"))
        .and(path("/v1/message"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&bot.kik)
        .await;
    let router = bot.router();

    let response = router
        .clone()
        .oneshot(signed_request(webhook_body("alice", "Liste")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::builder().uri("/debug").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json[0]["messages"][0]["body"], "Liste");
}

#[tokio::test]
async fn test_uploaded_pictures_are_served() {
    let bot = TestBot::new().await;
    std::fs::write(bot.pictures.path().join("alice-1.png"), b"png").unwrap();

    let response = bot
        .router()
        .oneshot(
            Request::builder()
                .uri("/picture/alice-1.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
