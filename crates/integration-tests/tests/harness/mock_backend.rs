//! Mock text-continuation backend for integration tests
//!
//! Mimics the llama.cpp-style server surface the gateway talks to: health,
//! model listing, server properties and `/v1/completions` with or without
//! SSE streaming.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::stream;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Canned failure returned by `/v1/completions`
#[derive(Clone)]
pub struct Failure {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

/// What the mock answers with
#[derive(Clone)]
pub struct Behavior {
    /// Text of a non-streaming completion
    pub text: String,
    /// Raw `data:` payloads of a streaming completion, sent in order
    pub records: Vec<String>,
    /// Usage block of a non-streaming completion; omitted when `None`
    pub usage: Option<Value>,
    pub failure: Option<Failure>,
    pub healthy: bool,
    /// Delay before answering `/v1/completions`
    pub delay: Duration,
    /// Pause before each streamed record
    pub record_gap: Duration,
    /// Keep the event stream open after the last record instead of closing it
    pub stall: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            text: "Hello from the backend".to_owned(),
            records: vec![chunk("Hello"), chunk(" there"), "[DONE]".to_owned()],
            usage: Some(json!({"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15})),
            failure: None,
            healthy: true,
            delay: Duration::ZERO,
            record_gap: Duration::ZERO,
            stall: false,
        }
    }
}

/// Completion chunk payload carrying `text`
pub fn chunk(text: &str) -> String {
    json!({"choices": [{"index": 0, "text": text, "finish_reason": null}]}).to_string()
}

/// Mock backend that returns predictable responses
pub struct MockBackend {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    behavior: Behavior,
    completion_count: AtomicU32,
    last_request: Mutex<Option<Value>>,
    stream_dropped: AtomicBool,
}

/// Marks the event stream as dropped once its body goes away
struct StreamGuard(Arc<MockState>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.stream_dropped.store(true, Ordering::SeqCst);
    }
}

impl MockBackend {
    /// Start the mock with default behavior
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(Behavior::default()).await
    }

    /// Start a mock whose non-streaming completion is `text`
    pub async fn start_with_text(text: &str) -> anyhow::Result<Self> {
        Self::start_with(Behavior {
            text: text.to_owned(),
            ..Behavior::default()
        })
        .await
    }

    /// Start a mock that streams `records` verbatim as `data:` lines
    pub async fn start_streaming(records: Vec<String>) -> anyhow::Result<Self> {
        Self::start_with(Behavior {
            records,
            ..Behavior::default()
        })
        .await
    }

    /// Start a mock that streams `records` and then hangs without closing
    pub async fn start_stalling(records: Vec<String>) -> anyhow::Result<Self> {
        Self::start_with(Behavior {
            records,
            record_gap: Duration::from_millis(50),
            stall: true,
            ..Behavior::default()
        })
        .await
    }

    /// Start a mock that fails every completion
    pub async fn start_failing(status: StatusCode, content_type: &'static str, body: &str) -> anyhow::Result<Self> {
        Self::start_with(Behavior {
            failure: Some(Failure {
                status,
                content_type,
                body: body.to_owned(),
            }),
            ..Behavior::default()
        })
        .await
    }

    pub async fn start_with(behavior: Behavior) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            behavior,
            completion_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
            stream_dropped: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/health", routing::get(handle_health))
            .route("/v1/models", routing::get(handle_models))
            .route("/props", routing::get(handle_props))
            .route("/v1/completions", routing::post(handle_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as the backend
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of `/v1/completions` requests received
    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    /// Body of the most recent `/v1/completions` request
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }

    /// Whether the body of a streamed completion has been dropped
    ///
    /// True once the stream finished or the reader went away.
    pub fn stream_dropped(&self) -> bool {
        self.state.stream_dropped.load(Ordering::SeqCst)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// URL of a local port nothing listens on
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{addr}")
}

// -- Handlers --

async fn handle_health(State(state): State<Arc<MockState>>) -> Response {
    if state.behavior.healthy {
        Json(json!({"status": "ok"})).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": {"message": "Loading model"}}))).into_response()
    }
}

async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "qwen-test", "object": "model", "owned_by": "llamacpp"}]
    }))
}

async fn handle_props() -> Json<Value> {
    Json(json!({
        "default_generation_settings": {"n_ctx": 8192},
        "total_slots": 4
    }))
}

async fn handle_completions(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.completion_count.fetch_add(1, Ordering::Relaxed);
    let stream = body["stream"].as_bool().unwrap_or(false);
    *state.last_request.lock().unwrap() = Some(body);

    let behavior = &state.behavior;

    if !behavior.delay.is_zero() {
        tokio::time::sleep(behavior.delay).await;
    }

    if let Some(failure) = &behavior.failure {
        return (
            failure.status,
            [(header::CONTENT_TYPE, failure.content_type)],
            failure.body.clone(),
        )
            .into_response();
    }

    if stream {
        let gap = behavior.record_gap;
        let stall = behavior.stall;
        let guard = StreamGuard(Arc::clone(&state));

        let records = stream::unfold(
            (behavior.records.clone().into_iter(), guard),
            move |(mut records, guard)| async move {
                tokio::time::sleep(gap).await;

                match records.next() {
                    Some(record) => Some((Ok::<_, Infallible>(format!("data: {record}\n\n")), (records, guard))),
                    None if stall => {
                        std::future::pending::<()>().await;
                        None
                    }
                    None => None,
                }
            },
        );

        return ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(records)).into_response();
    }

    let mut response = json!({
        "id": "cmpl-test",
        "object": "text_completion",
        "model": "qwen-test",
        "choices": [{"index": 0, "text": behavior.text, "finish_reason": "stop"}]
    });

    if let Some(usage) = &behavior.usage {
        response["usage"] = usage.clone();
    }

    Json(response).into_response()
}
