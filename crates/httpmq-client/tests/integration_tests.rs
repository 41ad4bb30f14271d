//! Integration tests for httpmq-client
//!
//! These tests spin up a mock httpmq data plane and drive the client over
//! real HTTP, including the chunked subscription socket.

use std::collections::HashMap;
use std::convert::Infallible;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use httpmq_client::streaming::{handler_fn, MessageFrame};
use httpmq_client::testing::{wait_for, TestServer};
use httpmq_client::{
    ApiError, CancellationToken, DataClient, HttpmqError, ReceivedMessage, RequestContext,
    StreamItem, SubscribeRequest, REQUEST_ID_HEADER,
};

// =============================================================================
// Mock Data Plane
// =============================================================================

/// What the mock saw on a subscribe call
#[derive(Debug, Clone)]
struct SubscribeCall {
    stream: String,
    consumer: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
}

#[derive(Default)]
struct MockDataPlane {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    acks: Mutex<Vec<(String, String, Value)>>,
    subscribes: Mutex<Vec<SubscribeCall>>,
    /// Frames for the next subscribe call; dropping the sender closes the stream
    feed: Mutex<Option<mpsc::Receiver<String>>>,
}

type SharedMock = Arc<MockDataPlane>;

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn ready(headers: HeaderMap) -> Json<Value> {
    Json(json!({"success": true, "request_id": request_id(&headers)}))
}

async fn publish(
    State(mock): State<SharedMock>,
    Path(subject): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    mock.published
        .lock()
        .unwrap()
        .push((subject, body.to_vec()));
    Json(json!({"success": true, "request_id": request_id(&headers)}))
}

async fn ack(
    State(mock): State<SharedMock>,
    Path((stream, consumer)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if stream == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "request_id": "r1",
                "error": {"code": 404, "message": "not found"}
            })),
        )
            .into_response();
    }

    mock.acks.lock().unwrap().push((stream, consumer, body));
    Json(json!({"success": true, "request_id": request_id(&headers)})).into_response()
}

async fn subscribe(
    State(mock): State<SharedMock>,
    Path((stream, consumer)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    mock.subscribes.lock().unwrap().push(SubscribeCall {
        stream: stream.clone(),
        consumer,
        query,
        headers: headers.clone(),
    });

    if stream == "forbidden" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "request_id": request_id(&headers),
                "error": {"code": 403, "message": "not allowed"}
            })),
        )
            .into_response();
    }

    let Some(rx) = mock.feed.lock().unwrap().take() else {
        return StatusCode::CONFLICT.into_response();
    };
    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
        .into_response()
}

fn mock_router(mock: SharedMock) -> Router {
    Router::new()
        .route("/v1/data/ready", get(ready))
        .route("/v1/data/subject/{subject}", post(publish))
        .route(
            "/v1/data/stream/{stream}/consumer/{consumer}",
            get(subscribe),
        )
        .route(
            "/v1/data/stream/{stream}/consumer/{consumer}/ack",
            post(ack),
        )
        .with_state(mock)
}

// =============================================================================
// Test Helpers
// =============================================================================

async fn create_test_server() -> (TestServer, SharedMock) {
    let mock = Arc::new(MockDataPlane::default());
    let server = TestServer::start(mock_router(mock.clone()))
        .await
        .expect("Failed to start test server");
    (server, mock)
}

/// Install a frame feed for the next subscribe call
fn install_feed(mock: &MockDataPlane, capacity: usize) -> mpsc::Sender<String> {
    let (tx, rx) = mpsc::channel(capacity);
    *mock.feed.lock().unwrap() = Some(rx);
    tx
}

fn message(seq: u64, payload: &[u8]) -> ReceivedMessage {
    ReceivedMessage {
        stream: "S".to_string(),
        stream_seq: seq,
        consumer: "C".to_string(),
        consumer_seq: seq + 100,
        subject: "subj.1".to_string(),
        message: payload.to_vec(),
        request_id: format!("delivery-{}", seq),
    }
}

fn frame_line(msg: &ReceivedMessage) -> String {
    let mut line = serde_json::to_string(&MessageFrame::encode(msg)).unwrap();
    line.push('\n');
    line
}

fn collector() -> (
    impl httpmq_client::MessageHandler,
    Arc<Mutex<Vec<ReceivedMessage>>>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler = handler_fn(move |item: StreamItem| {
        if let Some(msg) = item.into_message() {
            sink.lock().unwrap().push(msg);
        }
        async { ControlFlow::Continue(()) }
    });
    (handler, seen)
}

// =============================================================================
// Request/Response Tests
// =============================================================================

#[tokio::test]
async fn test_ready_echoes_request_id() {
    let (server, _mock) = create_test_server().await;

    let ctx = RequestContext::new();
    let rid = server.client.ready(&ctx).await.unwrap();
    assert_eq!(rid, ctx.request_id());
}

#[tokio::test]
async fn test_ready_not_ok_status() {
    let router = Router::new().route(
        "/v1/data/ready",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let server = TestServer::start(router).await.unwrap();

    let ctx = RequestContext::new().with_request_id("ready-1");
    let err = server.client.ready(&ctx).await.unwrap_err();
    match err {
        HttpmqError::Api(api) => {
            assert_eq!(api.request_id, "ready-1");
            assert_eq!(api.status_code, 503);
            assert_eq!(api.message.as_deref(), Some("dataplane API is not ready"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_publish() {
    let (server, mock) = create_test_server().await;

    let ctx = RequestContext::new();
    let rid = server
        .client
        .publish("subj.1", b"Hello world", &ctx)
        .await
        .unwrap();

    assert_eq!(rid, ctx.request_id());
    let published = mock.published.lock().unwrap();
    assert_eq!(
        *published,
        vec![("subj.1".to_string(), b"Hello world".to_vec())]
    );
}

#[tokio::test]
async fn test_send_ack_simple() {
    let (server, mock) = create_test_server().await;

    let mut msg = message(7, b"payload");
    msg.consumer_seq = 3;
    let ctx = RequestContext::new();
    let rid = server.client.send_ack_simple(&msg, &ctx).await.unwrap();

    assert_eq!(rid, ctx.request_id());
    let acks = mock.acks.lock().unwrap();
    assert_eq!(
        *acks,
        vec![(
            "S".to_string(),
            "C".to_string(),
            json!({"stream": 7, "consumer": 3})
        )]
    );
}

#[tokio::test]
async fn test_send_ack_rejected() {
    let (server, mock) = create_test_server().await;

    let err = server
        .client
        .send_ack("missing", 7, "C", 3, &RequestContext::new())
        .await
        .unwrap_err();

    match err {
        HttpmqError::Api(api) => {
            assert_eq!(api, ApiError::new("r1", 404).with_message("not found"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
    assert!(mock.acks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_error_carries_request_id() {
    // Grab a free port, then release it so nothing listens there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = DataClient::new(&format!("http://{}", addr)).unwrap();
    let ctx = RequestContext::new().with_request_id("nowhere");

    let err = client.ready(&ctx).await.unwrap_err();
    assert!(matches!(err, HttpmqError::Connect { .. }));
    assert_eq!(err.request_id(), Some("nowhere"));

    let (mut handler, _) = collector();
    let err = client
        .push_subscribe(
            &SubscribeRequest::new("S", "C", "subj.1"),
            &mut handler,
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HttpmqError::Connect { .. }));
    assert_eq!(err.request_id(), Some("nowhere"));
}

// =============================================================================
// Push Subscription Tests
// =============================================================================

#[tokio::test]
async fn test_push_subscribe_ordered_until_server_close() {
    let (server, mock) = create_test_server().await;

    let feed = install_feed(&mock, 64);
    for seq in 1..=20 {
        feed.send(frame_line(&message(seq, b"x"))).await.unwrap();
    }
    drop(feed);

    let ctx = RequestContext::new();
    let (mut handler, seen) = collector();
    let rid = server
        .client
        .push_subscribe(
            &SubscribeRequest::new("S", "C", "subj.1"),
            &mut handler,
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(rid, ctx.request_id());
    let seqs: Vec<u64> = seen.lock().unwrap().iter().map(|m| m.stream_seq).collect();
    assert_eq!(seqs, (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_push_subscribe_frames_split_across_chunks() {
    let (server, mock) = create_test_server().await;

    let feed = install_feed(&mock, 8);
    let lines: String = (1..=3).map(|seq| frame_line(&message(seq, b"abc"))).collect();
    tokio::spawn(async move {
        for piece in lines.as_bytes().chunks(17) {
            let piece = String::from_utf8(piece.to_vec()).unwrap();
            if feed.send(piece).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    });

    let (mut handler, seen) = collector();
    server
        .client
        .push_subscribe(
            &SubscribeRequest::new("S", "C", "subj.1").poll_interval(Duration::from_millis(20)),
            &mut handler,
            &RequestContext::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![message(1, b"abc"), message(2, b"abc"), message(3, b"abc")]);
}

#[tokio::test]
async fn test_push_subscribe_cancel_while_server_produces() {
    let (server, mock) = create_test_server().await;

    let feed = install_feed(&mock, 4);
    let disconnected = Arc::new(AtomicBool::new(false));
    let producer_done = disconnected.clone();
    tokio::spawn(async move {
        for seq in 1.. {
            if feed.send(frame_line(&message(seq, b"tick"))).await.is_err() {
                producer_done.store(true, Ordering::SeqCst);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let cancel = CancellationToken::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let trigger = cancel.clone();
    let mut handler = handler_fn(move |item: StreamItem| {
        let mut seen = sink.lock().unwrap();
        seen.extend(item.into_message());
        if seen.len() == 3 {
            trigger.cancel();
        }
        async { ControlFlow::Continue(()) }
    });

    let ctx = RequestContext::new();
    let request = SubscribeRequest::new("S", "C", "subj.1").poll_interval(Duration::from_millis(20));
    let rid = tokio::time::timeout(
        Duration::from_secs(2),
        server
            .client
            .push_subscribe(&request, &mut handler, &ctx, &cancel),
    )
    .await
    .expect("subscription did not stop after cancel")
    .unwrap();

    assert_eq!(rid, ctx.request_id());

    // Contiguous prefix of the produced sequence, nothing skipped
    let seqs: Vec<u64> = seen.lock().unwrap().iter().map(|m| m.stream_seq).collect();
    assert!(seqs.len() >= 3);
    assert_eq!(seqs, (1..=seqs.len() as u64).collect::<Vec<_>>());

    // The connection was released, so the server notices the client left
    let flag = disconnected.clone();
    assert!(
        wait_for(
            || {
                let flag = flag.clone();
                async move { flag.load(Ordering::SeqCst) }
            },
            Duration::from_secs(2),
        )
        .await
    );
}

#[tokio::test]
async fn test_push_subscribe_forwards_query_and_headers() {
    let (server, mock) = create_test_server().await;
    drop(install_feed(&mock, 1));

    let ctx = RequestContext::new()
        .with_bearer_token("secret-token")
        .add_header("x-tenant", "blue")
        .add_param("extra", "1");
    let request = SubscribeRequest::new("S", "C", "subj.*")
        .max_inflight(2)
        .delivery_group("workers");

    let (mut handler, _) = collector();
    server
        .client
        .push_subscribe(&request, &mut handler, &ctx, &CancellationToken::new())
        .await
        .unwrap();

    let calls = mock.subscribes.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.stream, "S");
    assert_eq!(call.consumer, "C");
    assert_eq!(call.query.get("subject_name").map(String::as_str), Some("subj.*"));
    assert_eq!(call.query.get("max_msg_inflight").map(String::as_str), Some("2"));
    assert_eq!(call.query.get("delivery_group").map(String::as_str), Some("workers"));
    assert_eq!(call.query.get("extra").map(String::as_str), Some("1"));
    assert_eq!(request_id(&call.headers), ctx.request_id());
    assert_eq!(
        call.headers.get(header::AUTHORIZATION).unwrap(),
        "Bearer secret-token"
    );
    assert_eq!(call.headers.get("x-tenant").unwrap(), "blue");
}

#[tokio::test]
async fn test_push_subscribe_optional_params_omitted() {
    let (server, mock) = create_test_server().await;
    drop(install_feed(&mock, 1));

    let (mut handler, _) = collector();
    server
        .client
        .push_subscribe(
            &SubscribeRequest::new("S", "C", "subj.1"),
            &mut handler,
            &RequestContext::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let calls = mock.subscribes.lock().unwrap();
    assert!(!calls[0].query.contains_key("max_msg_inflight"));
    assert!(!calls[0].query.contains_key("delivery_group"));
}

#[tokio::test]
async fn test_push_subscribe_rejected_status() {
    let (server, _mock) = create_test_server().await;

    let ctx = RequestContext::new();
    let (mut handler, seen) = collector();
    let err = server
        .client
        .push_subscribe(
            &SubscribeRequest::new("forbidden", "C", "subj.1"),
            &mut handler,
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match &err {
        HttpmqError::Protocol {
            request_id, status, detail,
        } => {
            assert_eq!(request_id, ctx.request_id());
            assert_eq!(*status, Some(403));
            assert!(detail.contains("not allowed"));
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_base64_payload_integrity() {
    let (server, mock) = create_test_server().await;

    let feed = install_feed(&mock, 4);
    feed.send(frame_line(&message(1, &[0x00, 0xFF, 0x10])))
        .await
        .unwrap();
    drop(feed);

    let (mut handler, seen) = collector();
    server
        .client
        .push_subscribe(
            &SubscribeRequest::new("S", "C", "subj.1"),
            &mut handler,
            &RequestContext::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap()[0].message, vec![0x00, 0xFF, 0x10]);
}

#[tokio::test]
async fn test_in_band_error_frame_is_forwarded() {
    let (server, mock) = create_test_server().await;

    let feed = install_feed(&mock, 4);
    feed.send(frame_line(&message(1, b"a"))).await.unwrap();
    feed.send(
        "{\"success\":false,\"request_id\":\"srv-9\",\"error\":{\"code\":500,\"message\":\"consumer deleted\"}}\n"
            .to_string(),
    )
    .await
    .unwrap();
    drop(feed);

    let (tx, mut rx) = mpsc::channel(8);
    let mut handler = tx;
    server
        .client
        .push_subscribe(
            &SubscribeRequest::new("S", "C", "subj.1"),
            &mut handler,
            &RequestContext::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    drop(handler);

    assert_eq!(rx.recv().await, Some(StreamItem::Delivered(message(1, b"a"))));
    assert_eq!(
        rx.recv().await,
        Some(StreamItem::ServerError(
            ApiError::new("srv-9", 500).with_message("consumer deleted")
        ))
    );
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn test_channel_subscription_and_ack() {
    let (server, mock) = create_test_server().await;

    let feed = install_feed(&mock, 8);
    for seq in 1..=3 {
        feed.send(frame_line(&message(seq, b"job"))).await.unwrap();
    }

    let cancel = CancellationToken::new();
    let (mut rx, task) = server.client.subscribe(
        SubscribeRequest::new("S", "C", "subj.1").poll_interval(Duration::from_millis(20)),
        RequestContext::new().with_request_id("chan-1"),
        cancel.clone(),
        1,
    );

    for seq in 1..=3 {
        let msg = rx.recv().await.unwrap().into_message().unwrap();
        assert_eq!(msg.stream_seq, seq);
        server
            .client
            .send_ack_simple(&msg, &RequestContext::new())
            .await
            .unwrap();
    }

    cancel.cancel();
    let rid = task.await.unwrap().unwrap();
    assert_eq!(rid, "chan-1");
    drop(feed);

    let acked: Vec<Value> = mock
        .acks
        .lock()
        .unwrap()
        .iter()
        .map(|(_, _, body)| body.clone())
        .collect();
    assert_eq!(
        acked,
        vec![
            json!({"stream": 1, "consumer": 101}),
            json!({"stream": 2, "consumer": 102}),
            json!({"stream": 3, "consumer": 103}),
        ]
    );
}
