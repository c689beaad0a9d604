//! Client for the text-continuation backend

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};
use http::{HeaderValue, Method, StatusCode, header};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use textbridge_config::{BackendConfig, SamplingConfig};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url::Url;

use crate::error::GatewayError;
use crate::prompt::STOP_MARKERS;
use crate::protocol::chat::ChatCompletionRequest;
use crate::protocol::completion::{CompletionRequest, CompletionResponse};

/// `data:` payloads of a backend event stream, in arrival order
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>>;

/// Byte stream of a relayed backend body
pub type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Backend reply relayed untouched by a passthrough route
pub struct Passthrough {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: BodyStream,
}

/// Shared handle to the backend
///
/// Cheap to clone; every clone uses the same connection pool and the same
/// set of tracked stream forwarders.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    base_url: Url,
    health_timeout: Duration,
    sampling: SamplingConfig,
    stream_buffer: usize,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl BackendClient {
    /// Build the client from configuration
    ///
    /// `request_timeout` bounds every call end to end, a streaming body
    /// included.
    pub fn new(config: &BackendConfig, sampling: SamplingConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base_url: config.url.clone(),
                health_timeout: config.health_timeout,
                sampling,
                stream_buffer: config.stream_buffer,
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner.client.request(method, self.url(path))
    }

    /// Backend body for a chat request, caller values merged over the defaults
    pub fn completion_request(&self, prompt: String, chat: &ChatCompletionRequest, model: String) -> CompletionRequest {
        let defaults = &self.inner.sampling;

        let mut stop: Vec<String> = STOP_MARKERS.iter().map(|&marker| marker.to_owned()).collect();
        if let Some(extra) = chat.stop.clone() {
            stop.extend(extra.into_vec());
        }

        CompletionRequest {
            prompt,
            model,
            temperature: chat.temperature.unwrap_or(defaults.temperature),
            top_p: chat.top_p.unwrap_or(defaults.top_p),
            top_k: chat.top_k.unwrap_or(defaults.top_k),
            min_p: chat.min_p.unwrap_or(defaults.min_p),
            repeat_penalty: chat.repeat_penalty.unwrap_or(defaults.repeat_penalty),
            presence_penalty: chat.presence_penalty.unwrap_or(defaults.presence_penalty),
            n_predict: chat.token_limit().unwrap_or_else(|| i64::from(defaults.max_tokens)),
            stop,
            stream: chat.stream.unwrap_or(false),
        }
    }

    /// Issue a blocking completion call
    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        let response = self.send_completion(request).await?;

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(error = %e, "failed to read backend completion");
            GatewayError::from_transport(&e)
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(error = %e, "backend completion is not valid JSON");
            GatewayError::InvalidResponse(e.to_string())
        })
    }

    /// Open a streaming completion call
    ///
    /// Fails before any event is yielded when the backend cannot be reached
    /// or answers with a non-success status.
    pub async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, GatewayError> {
        let response = self.send_completion(request).await?;

        let events = response.bytes_stream().eventsource().map(|result| match result {
            Ok(event) => Ok(event.data),
            Err(EventStreamError::Transport(e)) if e.is_timeout() => Err(GatewayError::Timeout),
            Err(e) => Err(GatewayError::Streaming(e.to_string())),
        });

        Ok(Box::pin(events))
    }

    async fn send_completion(&self, request: &CompletionRequest) -> Result<Response, GatewayError> {
        let response = self
            .request(Method::POST, "/v1/completions")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, stream = request.stream, "backend request failed");
                GatewayError::from_transport(&e)
            })?;

        if !response.status().is_success() {
            return Err(relay_error(response).await);
        }

        Ok(response)
    }

    /// Probe backend health
    ///
    /// Never fails: a non-success status reads as `{"status": "error"}`, and
    /// an unreachable backend or unparsable body as `{"status": "unreachable"}`.
    pub async fn health(&self) -> Value {
        let response = match self
            .request(Method::GET, "/health")
            .timeout(self.inner.health_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "backend health probe failed");
                return json!({ "status": "unreachable" });
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "backend reported unhealthy");
            return json!({ "status": "error" });
        }

        response.json().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "backend health body unreadable");
            json!({ "status": "unreachable" })
        })
    }

    /// Relay a request to `path` and hand back the raw reply
    ///
    /// Non-success statuses are part of the reply, not an error.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        content_type: Option<HeaderValue>,
        body: Bytes,
    ) -> Result<Passthrough, GatewayError> {
        let mut builder = self.request(method, path);

        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, path, "backend passthrough failed");
            GatewayError::from_transport(&e)
        })?;

        Ok(Passthrough {
            status: response.status(),
            content_type: response.headers().get(header::CONTENT_TYPE).cloned(),
            body: Box::pin(response.bytes_stream()),
        })
    }

    /// Capacity of the channel between a forwarder and its client
    pub fn stream_buffer(&self) -> usize {
        self.inner.stream_buffer
    }

    /// Token cancelled when the gateway shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Run a stream forwarder as a tracked task
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.tasks.spawn(task);
    }

    /// Number of forwarders still running
    pub fn active_streams(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Stop every forwarder and wait up to `grace` for them to exit
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.shutdown.cancel();
        self.inner.tasks.close();

        if tokio::time::timeout(grace, self.inner.tasks.wait()).await.is_err() {
            tracing::warn!(remaining = self.inner.tasks.len(), "stream forwarders still running after grace period");
        }
    }
}

/// Capture a non-success backend reply so it can be relayed verbatim
async fn relay_error(response: Response) -> GatewayError {
    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    tracing::warn!(status = %status, "backend returned error");

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, status = %status, "failed to read backend error body");
            return GatewayError::from_transport(&e);
        }
    };

    GatewayError::Backend {
        status,
        content_type,
        body,
    }
}
