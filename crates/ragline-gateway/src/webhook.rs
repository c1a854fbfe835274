// Inbound webhook handler
//
// Verifies the delivery signature, extracts message events, and dispatches
// one workflow execution per text event. The delivery protocol expects a
// fast acknowledgement, so the response reports dispatch results, not
// execution results.
//
// Decision: non-message events (follow, join, ...) are acknowledged as
// "ignored" instead of failing the delivery.
// Decision: one event's failure never aborts its siblings; 500 is returned
// only when every event in a non-empty delivery failed.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use ragline_core::event::conversation_id_for;
use ragline_core::{InboundEvent, MessagingClient};
use ragline_line::signature;
use ragline_worker::{DispatchStatus, EventDispatcher};

/// Canned reply for events the text-only handler cannot process
pub const UNSUPPORTED_CONTENT_REPLY: &str = "テキスト以外は受け付けられません";

const SIGNATURE_HEADER: &str = "x-line-signature";

/// App state shared across webhook routes
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<EventDispatcher>,
    pub messaging: Arc<dyn MessagingClient>,
    pub channel_secret: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .with_state(state)
}

// -----------------------------
// Webhook wire types
// -----------------------------

#[derive(Debug, Deserialize)]
struct WebhookRequest {
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    message: Option<WebhookMessage>,
    #[serde(rename = "replyToken")]
    reply_token: Option<String>,
    source: Option<WebhookSource>,
    /// Milliseconds since the epoch
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookSource {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "groupId")]
    group_id: Option<String>,
}

/// Per-event dispatch result reported back to the delivery caller
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct EventAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// A workflow execution was started
    Admitted,
    /// Redelivered message id; no new execution
    Duplicate,
    /// Non-text content, answered with the canned reply
    Unsupported,
    /// Not a message event
    Ignored,
    /// The event could not be dispatched
    Failed,
}

impl EventAck {
    fn ignored() -> Self {
        Self {
            message_id: None,
            status: EventStatus::Ignored,
            error: None,
        }
    }

    fn failed(message_id: Option<String>, error: impl std::fmt::Display) -> Self {
        Self {
            message_id,
            status: EventStatus::Failed,
            error: Some(error.to_string()),
        }
    }
}

// -----------------------------
// Handlers
// -----------------------------

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let delivery_id = Uuid::new_v4();
    debug!(delivery_id = %delivery_id, bytes = body.len(), "Webhook delivery received");

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if !signature::verify(&state.channel_secret, &body, provided) {
        warn!(delivery_id = %delivery_id, "Webhook signature verification failed");
        return (StatusCode::UNAUTHORIZED, "signature validation failed").into_response();
    }

    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(delivery_id = %delivery_id, error = %e, "Webhook body not parseable");
            return (StatusCode::BAD_REQUEST, "invalid body").into_response();
        }
    };

    // Events are independent; process them concurrently and collect per-event
    // acknowledgements.
    let acks = join_all(
        request
            .events
            .into_iter()
            .map(|event| handle_event(&state, event)),
    )
    .await;

    let failed = acks
        .iter()
        .filter(|ack| ack.status == EventStatus::Failed)
        .count();

    if !acks.is_empty() && failed == acks.len() {
        error!(delivery_id = %delivery_id, events = acks.len(), "Every event in the delivery failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response();
    }

    if failed > 0 {
        warn!(
            delivery_id = %delivery_id,
            failed = failed,
            events = acks.len(),
            "Delivery dispatched with partial failures"
        );
    }

    (StatusCode::CREATED, Json(acks)).into_response()
}

async fn handle_event(state: &AppState, event: WebhookEvent) -> EventAck {
    if event.kind != "message" {
        warn!(event_type = %event.kind, "Skipping non-message event");
        return EventAck::ignored();
    }

    let (message, reply_token, source) = match (event.message, event.reply_token, event.source) {
        (Some(message), Some(reply_token), Some(source)) => (message, reply_token, source),
        _ => {
            warn!("Message event missing message, reply token, or source");
            return EventAck::ignored();
        }
    };

    let user_id = match source.user_id {
        Some(user_id) => user_id,
        None => {
            warn!(message_id = %message.id, "Message event has no user id");
            return EventAck::failed(Some(message.id), "missing user id");
        }
    };
    // Group chats key the session by the group; 1:1 chats use the user id
    // for both "who to reply to" and "whose session to load".
    let source_id = match (source.kind.as_str(), source.group_id) {
        ("group", Some(group_id)) => group_id,
        _ => user_id.clone(),
    };

    // Best-effort working indicator; failure must not block the event
    if let Err(e) = state.messaging.show_typing(&source_id).await {
        warn!(message_id = %message.id, error = %e, "Loading indicator failed");
    }

    if message.kind != "text" {
        debug!(message_id = %message.id, content_type = %message.kind, "Unsupported content");
        return match state
            .messaging
            .reply(&reply_token, UNSUPPORTED_CONTENT_REPLY)
            .await
        {
            Ok(()) => EventAck {
                message_id: Some(message.id),
                status: EventStatus::Unsupported,
                error: None,
            },
            Err(e) => EventAck::failed(Some(message.id), e),
        };
    }

    let author_display_name = match state.messaging.display_name(&user_id).await {
        Ok(name) => name,
        Err(e) => {
            warn!(message_id = %message.id, error = %e, "Profile lookup failed");
            return EventAck::failed(Some(message.id), e);
        }
    };

    let inbound = InboundEvent {
        message_id: message.id.clone(),
        conversation_id: conversation_id_for(&source_id),
        reply_handle: reply_token,
        text: message.text.unwrap_or_default(),
        author_display_name,
        received_at: received_at(event.timestamp),
    };

    match state.dispatcher.dispatch(inbound).await {
        Ok(ack) => EventAck {
            message_id: Some(ack.message_id),
            status: match ack.status {
                DispatchStatus::Admitted => EventStatus::Admitted,
                DispatchStatus::Duplicate => EventStatus::Duplicate,
            },
            error: None,
        },
        Err(e) => EventAck::failed(Some(message.id), e),
    }
}

fn received_at(timestamp_ms: Option<i64>) -> DateTime<Utc> {
    timestamp_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use ragline_core::{
        GenerationClient, GenerationRequest, GenerationResult, RelayError, Result, SessionStore,
    };
    use ragline_storage::MemorySessionStore;
    use ragline_worker::WorkflowExecutor;

    const SECRET: &str = "test-channel-secret";

    struct FakeMessaging {
        replies: Mutex<Vec<(String, String)>>,
        typing_calls: AtomicU32,
        fail_typing: bool,
        fail_profile: bool,
    }

    impl FakeMessaging {
        fn new() -> Self {
            Self {
                replies: Mutex::new(Vec::new()),
                typing_calls: AtomicU32::new(0),
                fail_typing: false,
                fail_profile: false,
            }
        }

        fn with_failing_typing() -> Self {
            Self {
                fail_typing: true,
                ..Self::new()
            }
        }

        fn with_failing_profile() -> Self {
            Self {
                fail_profile: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl MessagingClient for FakeMessaging {
        async fn reply(&self, reply_handle: &str, text: &str) -> Result<()> {
            self.replies
                .lock()
                .unwrap()
                .push((reply_handle.to_string(), text.to_string()));
            Ok(())
        }

        async fn show_typing(&self, _source_id: &str) -> Result<()> {
            self.typing_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_typing {
                return Err(RelayError::transient("loading endpoint down"));
            }
            Ok(())
        }

        async fn display_name(&self, _user_id: &str) -> Result<String> {
            if self.fail_profile {
                return Err(RelayError::delivery("profile endpoint down"));
            }
            Ok("Alex".to_string())
        }
    }

    struct FakeGenerator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl GenerationClient for FakeGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerationResult {
                answer_text: "hi".to_string(),
                continuation_token: "t1".to_string(),
            })
        }
    }

    struct TestHarness {
        state: AppState,
        store: Arc<MemorySessionStore>,
        generator: Arc<FakeGenerator>,
        messaging: Arc<FakeMessaging>,
    }

    fn harness_with(messaging: FakeMessaging) -> TestHarness {
        let store = Arc::new(MemorySessionStore::new());
        let generator = Arc::new(FakeGenerator {
            calls: AtomicU32::new(0),
        });
        let messaging = Arc::new(messaging);
        let executor = Arc::new(WorkflowExecutor::new(
            store.clone(),
            generator.clone(),
            messaging.clone(),
        ));
        let state = AppState {
            dispatcher: Arc::new(EventDispatcher::new(executor)),
            messaging: messaging.clone(),
            channel_secret: SECRET.to_string(),
        };
        TestHarness {
            state,
            store,
            generator,
            messaging,
        }
    }

    fn harness() -> TestHarness {
        harness_with(FakeMessaging::new())
    }

    fn text_event_body() -> serde_json::Value {
        serde_json::json!({
            "destination": "bot",
            "events": [{
                "type": "message",
                "message": {"type": "text", "id": "m1", "text": "hello"},
                "replyToken": "r1",
                "source": {"type": "user", "userId": "U1"},
                "timestamp": 1_700_000_000_000i64
            }]
        })
    }

    async fn post_webhook(
        harness: &TestHarness,
        body: &serde_json::Value,
        signature: Option<String>,
    ) -> (StatusCode, serde_json::Value) {
        let raw = serde_json::to_vec(body).unwrap();
        let signature =
            signature.unwrap_or_else(|| super::signature::sign(SECRET, &raw));

        let response = routes(harness.state.clone())
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .header("X-Line-Signature", signature)
                    .body(axum::body::Body::from(raw))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::json!(String::from_utf8_lossy(&bytes)));
        (status, json)
    }

    #[tokio::test]
    async fn invalid_signature_rejects_the_delivery_without_dispatching() {
        let harness = harness();

        let (status, _) = post_webhook(
            &harness,
            &text_event_body(),
            Some("forged".to_string()),
        )
        .await;
        harness.state.dispatcher.drain().await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 0);
        assert!(harness.messaging.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn text_event_is_admitted_and_answered_end_to_end() {
        let harness = harness();

        let (status, acks) = post_webhook(&harness, &text_event_body(), None).await;
        harness.state.dispatcher.drain().await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(acks[0]["message_id"], "m1");
        assert_eq!(acks[0]["status"], "admitted");

        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.messaging.typing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            harness.messaging.replies.lock().unwrap().as_slice(),
            &[("r1".to_string(), "hi".to_string())]
        );

        // Session is keyed by the hashed source id, not the raw user id
        let record = harness
            .store
            .get(&conversation_id_for("U1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.continuation_token, "t1");
    }

    #[tokio::test]
    async fn non_text_event_gets_the_canned_reply_and_no_execution() {
        let harness = harness();
        let body = serde_json::json!({
            "events": [{
                "type": "message",
                "message": {"type": "image", "id": "m2"},
                "replyToken": "r2",
                "source": {"type": "user", "userId": "U1"},
                "timestamp": 1_700_000_000_000i64
            }]
        });

        let (status, acks) = post_webhook(&harness, &body, None).await;
        harness.state.dispatcher.drain().await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(acks[0]["status"], "unsupported");
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            harness.messaging.replies.lock().unwrap().as_slice(),
            &[("r2".to_string(), UNSUPPORTED_CONTENT_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn duplicate_delivery_of_the_same_message_id_runs_once() {
        let harness = harness();

        let (_, first) = post_webhook(&harness, &text_event_body(), None).await;
        let (_, second) = post_webhook(&harness, &text_event_body(), None).await;
        harness.state.dispatcher.drain().await;

        assert_eq!(first[0]["status"], "admitted");
        assert_eq!(second[0]["status"], "duplicate");
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.messaging.replies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_message_events_are_ignored_not_failed() {
        let harness = harness();
        let body = serde_json::json!({
            "events": [
                {"type": "follow", "source": {"type": "user", "userId": "U1"},
                 "replyToken": "r3", "timestamp": 1_700_000_000_000i64},
                {
                    "type": "message",
                    "message": {"type": "text", "id": "m3", "text": "hi"},
                    "replyToken": "r4",
                    "source": {"type": "user", "userId": "U1"},
                    "timestamp": 1_700_000_000_000i64
                }
            ]
        });

        let (status, acks) = post_webhook(&harness, &body, None).await;
        harness.state.dispatcher.drain().await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(acks[0]["status"], "ignored");
        assert_eq!(acks[1]["status"], "admitted");
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn typing_indicator_failure_does_not_block_the_event() {
        let harness = harness_with(FakeMessaging::with_failing_typing());

        let (status, acks) = post_webhook(&harness, &text_event_body(), None).await;
        harness.state.dispatcher.drain().await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(acks[0]["status"], "admitted");
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delivery_where_every_event_fails_returns_500() {
        let harness = harness_with(FakeMessaging::with_failing_profile());

        let (status, body) = post_webhook(&harness, &text_event_body(), None).await;
        harness.state.dispatcher.drain().await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!("Error"));
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_failed_event_does_not_fail_its_siblings() {
        let harness = harness();
        let body = serde_json::json!({
            "events": [
                {
                    "type": "message",
                    "message": {"type": "text", "id": "m6", "text": "hi"},
                    "replyToken": "r6",
                    "source": {"type": "user"},
                    "timestamp": 1_700_000_000_000i64
                },
                {
                    "type": "message",
                    "message": {"type": "text", "id": "m7", "text": "hi"},
                    "replyToken": "r7",
                    "source": {"type": "user", "userId": "U1"},
                    "timestamp": 1_700_000_000_000i64
                }
            ]
        });

        let (status, acks) = post_webhook(&harness, &body, None).await;
        harness.state.dispatcher.drain().await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(acks[0]["status"], "failed");
        assert_eq!(acks[0]["message_id"], "m6");
        assert_eq!(acks[1]["status"], "admitted");
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_delivery_acknowledges_with_an_empty_array() {
        let harness = harness();
        let body = serde_json::json!({"events": []});

        let (status, acks) = post_webhook(&harness, &body, None).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(acks, serde_json::json!([]));
    }

    #[tokio::test]
    async fn group_messages_key_the_session_by_the_group_id() {
        let harness = harness();
        let body = serde_json::json!({
            "events": [{
                "type": "message",
                "message": {"type": "text", "id": "m5", "text": "hello"},
                "replyToken": "r5",
                "source": {"type": "group", "groupId": "G1", "userId": "U1"},
                "timestamp": 1_700_000_000_000i64
            }]
        });

        let (_, acks) = post_webhook(&harness, &body, None).await;
        harness.state.dispatcher.drain().await;

        assert_eq!(acks[0]["status"], "admitted");
        assert!(harness
            .store
            .get(&conversation_id_for("G1"))
            .await
            .unwrap()
            .is_some());
        assert!(harness
            .store
            .get(&conversation_id_for("U1"))
            .await
            .unwrap()
            .is_none());
    }
}
