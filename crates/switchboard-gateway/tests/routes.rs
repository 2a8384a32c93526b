// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route-level tests: webhooks and the review API against a temp store.

use std::time::{Duration, Instant};

use axum::body::{Body, to_bytes};
use axum::Router;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use serde_json::{Value, json};
use switchboard_core::{BotState, ChannelKind, EventKind, InboundEvent};
use switchboard_gateway::auth::AuthConfig;
use switchboard_gateway::{GatewayState, router};
use switchboard_test_utils::TestHarness;
use switchboard_test_utils::harness::TENANT;
use switchboard_test_utils::mock_channel::VALID_SIGNATURE;
use switchboard_test_utils::scripted_resolver::answered;
use tower::ServiceExt;

const TOKEN: &str = "secret";

async fn harness() -> TestHarness {
    TestHarness::builder().build().await.unwrap()
}

fn app(h: &TestHarness) -> Router {
    router(GatewayState {
        orchestrator: h.orchestrator.clone(),
        tenants: h.tenants.clone(),
        auth: AuthConfig {
            admin_token: Some(TOKEN.to_string()),
        },
        webhook_budget: Duration::from_secs(5),
        start_time: Instant::now(),
    })
}

fn line_body(user: &str, token: &str, text: &str) -> String {
    let event = InboundEvent {
        tenant_id: TENANT.to_string(),
        channel: ChannelKind::Line,
        external_user_id: user.to_string(),
        kind: EventKind::Text,
        text: Some(text.to_string()),
        attachment_url: None,
        delivery_token: token.to_string(),
        reply_token: Some(format!("reply-{token}")),
        received_at: Utc::now(),
    };
    serde_json::to_string(&vec![event]).unwrap()
}

fn webhook(uri: &str, signature: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-line-signature", signature)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn api(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let h = harness().await;
    let response = app(&h)
        .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tenants"], 1);
}

#[tokio::test]
async fn signed_line_webhook_is_processed() {
    let h = harness().await;
    h.resolver.push(answered(1, "We open at 9.")).await;

    let response = app(&h)
        .oneshot(webhook(
            "/webhook/line/shop",
            VALID_SIGNATURE,
            line_body("U1", "evt-1", "when do you open?"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.line.sent_to("U1").await, vec!["We open at 9.".to_string()]);
    assert_eq!(h.messages("U1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn bad_signature_is_rejected_without_processing() {
    let h = harness().await;
    let response = app(&h)
        .oneshot(webhook("/webhook/line/shop", "forged", line_body("U1", "evt-1", "hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(h.line.send_attempts(), 0);
    assert!(h.conversation("U1").await.is_err());
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let h = harness().await;
    let response = app(&h)
        .oneshot(webhook("/webhook/line/nobody", VALID_SIGNATURE, line_body("U1", "evt-1", "hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn garbage_body_is_acknowledged() {
    let h = harness().await;
    let response = app(&h)
        .oneshot(webhook("/webhook/line/shop", VALID_SIGNATURE, "not json".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.line.send_attempts(), 0);
}

#[tokio::test]
async fn messenger_subscription_handshake() {
    let h = harness().await;
    let ok = app(&h)
        .oneshot(
            Request::get(
                "/webhook/messenger/shop?hub.mode=subscribe&hub.verify_token=fb-verify&hub.challenge=12345",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let bytes = to_bytes(ok.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"12345");

    let wrong = app(&h)
        .oneshot(
            Request::get(
                "/webhook/messenger/shop?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=12345",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn review_api_requires_bearer_token() {
    let h = harness().await;
    let response = app(&h)
        .oneshot(
            Request::get("/v1/tenants/shop/conversations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lists_conversations_and_messages() {
    let h = harness().await;
    h.resolver.push(answered(1, "Hello!")).await;
    h.send("U1", "hi").await.unwrap();

    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/conversations", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["user_id"], "U1");

    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/conversations/U1/messages", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    let texts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["hi", "Hello!"]);
}

#[tokio::test]
async fn missing_conversation_maps_to_404_json() {
    let h = harness().await;
    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/conversations/ghost", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn unknown_learned_kind_is_bad_request() {
    let h = harness().await;
    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/learned/recipes", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/learned/intent", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn bot_toggle_and_pin_are_logged() {
    let h = harness().await;
    h.send("U1", "hi").await.unwrap();

    let response = app(&h)
        .oneshot(api(
            "POST",
            "/v1/tenants/shop/conversations/U1/bot",
            Some(json!({"admin": "alice", "enabled": false})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.conversation("U1").await.unwrap().control.state, BotState::Manual);

    let response = app(&h)
        .oneshot(api(
            "POST",
            "/v1/tenants/shop/conversations/U1/pin",
            Some(json!({"admin": "alice", "reason": "refund"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["control"]["pin"]["reason"], "refund");

    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/activity?username=alice", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    let actions: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["pin", "toggle_bot"]);
}

#[tokio::test]
async fn blank_admin_is_rejected() {
    let h = harness().await;
    h.send("U1", "hi").await.unwrap();
    let response = app(&h)
        .oneshot(api(
            "POST",
            "/v1/tenants/shop/conversations/U1/bot",
            Some(json!({"admin": " ", "enabled": false})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.conversation("U1").await.unwrap().control.state, BotState::Normal);
}

#[tokio::test]
async fn admin_send_returns_sequence() {
    let h = harness().await;
    h.send("U1", "hi").await.unwrap();
    let response = app(&h)
        .oneshot(api(
            "POST",
            "/v1/tenants/shop/conversations/U1/send",
            Some(json!({"admin": "alice", "text": "Your parcel shipped."})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["seq"].as_i64().unwrap() > 0);
    assert!(
        h.line
            .sent_to("U1")
            .await
            .contains(&"Your parcel shipped.".to_string())
    );
}

#[tokio::test]
async fn crm_profile_round_trip() {
    let h = harness().await;
    h.send("U1", "hi").await.unwrap();

    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/crm/U1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&h)
        .oneshot(api(
            "PUT",
            "/v1/tenants/shop/crm/U1",
            Some(json!({"admin": "alice", "name": "Nok", "phone": "0812345678"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/crm/U1", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["name"], "Nok");
    assert_eq!(body["updated_by"], "alice");
}

#[tokio::test]
async fn digest_rejects_malformed_date() {
    let h = harness().await;
    let response = app(&h)
        .oneshot(api("GET", "/v1/tenants/shop/digest/yesterday", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
