//! Integration tests for the message REST fallback path
//!
//! Drives the router directly with tower's oneshot, over the in-memory
//! boundaries - no database or live socket required. The fallback path shares
//! the delivery engine with the event channel, so acks still reach live
//! connections even when the send arrives over HTTP.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use commons_api::middleware::IDENTITY_HEADER;
use commons_api::models::ConversationId;
use commons_api::routes::{messages_router, MessagesState};
use commons_api::services::delivery::OutgoingMessage;
use commons_api::services::LocalMediaStore;
use commons_api::websocket::events::ServerEvent;

use common::{drain, Harness};

fn router_for(harness: &Harness, media_root: &std::path::Path) -> Router {
    let state = MessagesState::new(
        harness.delivery.clone(),
        Arc::new(LocalMediaStore::new(media_root)),
    );
    messages_router(state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body is not valid json")
}

fn json_request(
    method: Method,
    uri: &str,
    user_id: Option<Uuid>,
    body: Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user_id) = user_id {
        builder = builder.header(IDENTITY_HEADER, user_id.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn send_without_identity_is_unauthorized() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let thread = ConversationId::direct(Uuid::new_v4(), Uuid::new_v4());
    let response = app
        .oneshot(json_request(
            Method::POST,
            &format!("/{}/messages", thread),
            None,
            json!({"text": "hi"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn send_json_persists_and_acks_live_connections() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let thread = ConversationId::direct(alice, bob);

    let (_, mut bob_rx) = harness.connect(bob);

    let response = app
        .oneshot(json_request(
            Method::POST,
            &format!("/{}/messages", thread),
            Some(alice),
            json!({"text": "over http"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["body"], "over http");
    assert_eq!(body["sender_id"], alice.to_string());
    assert_eq!(body["conversation_id"], thread.to_string());

    // Identical fan-out semantics as the event channel
    let bob_events = drain(&mut bob_rx);
    assert_eq!(bob_events.len(), 1);
    assert!(matches!(&bob_events[0], ServerEvent::MessageNew(_)));
}

#[tokio::test]
async fn empty_send_is_rejected() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let alice = Uuid::new_v4();
    let thread = ConversationId::direct(alice, Uuid::new_v4());

    let response = app
        .oneshot(json_request(
            Method::POST,
            &format!("/{}/messages", thread),
            Some(alice),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(harness.store.live_count(), 0);
}

#[tokio::test]
async fn outsider_send_is_forbidden() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let thread = ConversationId::direct(Uuid::new_v4(), Uuid::new_v4());

    let response = app
        .oneshot(json_request(
            Method::POST,
            &format!("/{}/messages", thread),
            Some(Uuid::new_v4()),
            json!({"text": "hi"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_conversation_id_is_a_validation_error() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let response = app
        .oneshot(json_request(
            Method::GET,
            "/not-a-conversation/messages",
            Some(Uuid::new_v4()),
            json!(null),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn history_returns_messages_in_ascending_order() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let thread = ConversationId::direct(alice, bob);

    for i in 0..3 {
        harness
            .delivery
            .send(
                alice,
                thread,
                OutgoingMessage {
                    text: Some(format!("message {}", i)),
                    media: None,
                },
            )
            .await
            .unwrap();
    }

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri(format!("/{}/messages?limit=2", thread))
                .header(IDENTITY_HEADER, bob.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["body"], "message 1");
    assert_eq!(messages[1]["body"], "message 2");
}

#[tokio::test]
async fn mark_read_route_reports_transitioned_ids_once() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let thread = ConversationId::direct(alice, bob);

    let sent = harness
        .delivery
        .send(
            alice,
            thread,
            OutgoingMessage {
                text: Some("hi".into()),
                media: None,
            },
        )
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/{}/messages/read", thread),
            Some(bob),
            json!({"message_ids": [sent.id]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["read"], json!([sent.id.to_string()]));

    // Marking again is idempotent
    let response = app
        .oneshot(json_request(
            Method::PATCH,
            &format!("/{}/messages/read", thread),
            Some(bob),
            json!({"message_ids": [sent.id]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["read"], json!([]));
}

#[tokio::test]
async fn delete_route_reports_deleted_ids() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let alice = Uuid::new_v4();
    let thread = ConversationId::direct(alice, Uuid::new_v4());

    let sent = harness
        .delivery
        .send(
            alice,
            thread,
            OutgoingMessage {
                text: Some("oops".into()),
                media: None,
            },
        )
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            Method::DELETE,
            &format!("/{}/messages", thread),
            Some(alice),
            json!({"message_ids": [sent.id]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["deleted"], json!([sent.id.to_string()]));
    assert_eq!(harness.store.live_count(), 0);
}

#[tokio::test]
async fn multipart_send_stores_the_attachment() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let app = router_for(&harness, dir.path());

    let alice = Uuid::new_v4();
    let thread = ConversationId::direct(alice, Uuid::new_v4());

    let boundary = "test-boundary-7e1c";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"text\"\r\n\r\n\
         look at this\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"pic.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         fake-png-bytes\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/{}/messages", thread))
                .header(IDENTITY_HEADER, alice.to_string())
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["body"], "look at this");
    assert_eq!(body["media_kind"], "image");

    let url = body["media_url"].as_str().unwrap();
    assert!(url.starts_with("/media/"));
    assert!(url.ends_with(".png"));

    // The attachment landed on disk
    let stored = dir.path().join(url.trim_start_matches("/media/"));
    let contents = std::fs::read(stored).unwrap();
    assert_eq!(contents, b"fake-png-bytes");
}
