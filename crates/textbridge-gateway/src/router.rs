//! Axum routes: health, backend passthrough and chat completions

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, Method, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt};
use serde_json::{Value, json};
use textbridge_core::HttpError;

use crate::backend::{BackendClient, Passthrough};
use crate::error::GatewayError;
use crate::prompt::format_prompt;
use crate::protocol::chat::{ChatCompletionRequest, ChatCompletionResponse};
use crate::protocol::completion::CompletionRequest;
use crate::sanitize::sanitize;
use crate::stream::{DONE, StreamEvent, StreamTranslator, translate_stream};
use crate::tool_call::{Extraction, extract_tool_calls};

/// Shared state for gateway route handlers
#[derive(Clone)]
pub struct GatewayState {
    backend: BackendClient,
    default_model: String,
}

impl GatewayState {
    /// `default_model` is reported when a chat request names no model
    pub const fn new(backend: BackendClient, default_model: String) -> Self {
        Self { backend, default_model }
    }
}

/// Build the gateway router
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", routing::get(health))
        // Passthrough endpoints
        .route("/v1/models", routing::get(list_models))
        .route("/props", routing::get(server_props))
        .route("/v1/completions", routing::post(raw_completions))
        // Translation endpoint
        .route("/v1/chat/completions", routing::post(chat_completions))
        .with_state(state)
}

/// Handle `GET /health`
///
/// Always 200; backend trouble shows up only in the `backend` field.
async fn health(State(state): State<GatewayState>) -> Json<Value> {
    let backend = state.backend.health().await;

    Json(json!({
        "status": "ok",
        "proxy": true,
        "backend": backend,
    }))
}

// -- Passthrough handlers --

/// Handle `GET /v1/models`
async fn list_models(State(state): State<GatewayState>) -> Response {
    passthrough(&state, Method::GET, "/v1/models", &HeaderMap::new(), Bytes::new()).await
}

/// Handle `GET /props`
async fn server_props(State(state): State<GatewayState>) -> Response {
    passthrough(&state, Method::GET, "/props", &HeaderMap::new(), Bytes::new()).await
}

/// Handle `POST /v1/completions`
async fn raw_completions(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    passthrough(&state, Method::POST, "/v1/completions", &headers, body).await
}

async fn passthrough(state: &GatewayState, method: Method, path: &str, headers: &HeaderMap, body: Bytes) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).cloned();

    match state.backend.forward(method, path, content_type, body).await {
        Ok(reply) => relay(reply),
        Err(e) => error_response(e),
    }
}

fn relay(reply: Passthrough) -> Response {
    let mut response = Response::new(Body::from_stream(reply.body));
    *response.status_mut() = reply.status;

    if let Some(content_type) = reply.content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }

    response
}

// -- Chat completions --

/// Handle `POST /v1/chat/completions`
async fn chat_completions(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(GatewayError::InvalidRequest(rejection.body_text())),
    };

    let model = request.model.clone().unwrap_or_else(|| state.default_model.clone());
    let prompt = format_prompt(&request.messages, request.tools());

    tracing::debug!(
        messages = request.messages.len(),
        tools = request.tools().len(),
        chars = prompt.len(),
        "prompt built"
    );

    let completion = state.backend.completion_request(prompt, &request, model.clone());

    if completion.stream {
        stream_chat(&state, &completion, model).await
    } else {
        complete_chat(&state, &completion, model).await
    }
}

async fn complete_chat(state: &GatewayState, completion: &CompletionRequest, model: String) -> Response {
    let response = match state.backend.complete(completion).await {
        Ok(response) => response,
        Err(e) => return error_response(e),
    };

    let cleaned = sanitize(response.text());
    let Extraction { text, tool_calls } = extract_tool_calls(&cleaned);

    if let Some(calls) = &tool_calls {
        tracing::debug!(count = calls.len(), "extracted tool calls");
    }

    let usage = response.usage.unwrap_or_default();

    Json(ChatCompletionResponse::assemble(model, text, tool_calls, usage)).into_response()
}

async fn stream_chat(state: &GatewayState, completion: &CompletionRequest, model: String) -> Response {
    let events = match state.backend.complete_stream(completion).await {
        Ok(events) => events,
        Err(e) => return error_response(e),
    };

    let translator = StreamTranslator::new(model);
    tracing::debug!(id = translator.id(), "streaming chat completion");

    sse_response(translate_stream(&state.backend, events, translator)).into_response()
}

/// Render stream events as SSE `data:` records
fn sse_response(
    stream: impl Stream<Item = StreamEvent> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let event_stream = stream.map(|event| match event {
        StreamEvent::Chunk(chunk) => Event::default().json_data(chunk),
        StreamEvent::Done => Ok(Event::default().data(DONE)),
        StreamEvent::Error(e) => Ok(Event::default().data(e.error_body().to_string())),
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}

/// Convert a gateway error into an HTTP response
///
/// Backend failures are relayed with the backend's own status, content type
/// and body; everything else gets an `OpenAI`-style JSON error.
fn error_response(error: GatewayError) -> Response {
    match error {
        GatewayError::Backend {
            status,
            content_type,
            body,
        } => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;

            if let Some(content_type) = content_type {
                response.headers_mut().insert(header::CONTENT_TYPE, content_type);
            }

            response
        }
        other => (other.status_code(), Json(other.error_body())).into_response(),
    }
}
