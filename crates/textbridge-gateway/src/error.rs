use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use textbridge_core::HttpError;
use thiserror::Error;

/// Errors that can occur while bridging a chat request to the backend
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Backend answered with a non-success status; relayed to the client as-is
    #[error("backend returned {status}")]
    Backend {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// Backend could not be reached or the connection broke
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Backend did not answer within the request timeout
    #[error("backend timed out")]
    Timeout,

    /// Error during streaming response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Backend answered with a success status but a body that is not a completion
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Classify a transport failure from the HTTP client
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Backend { status, .. } => *status,
            Self::Unreachable(_) | Self::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Streaming(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Backend { .. } | Self::Unreachable(_) | Self::InvalidResponse(_) => "upstream_error",
            Self::Timeout => "timeout_error",
            Self::Streaming(_) => "streaming_error",
            Self::InvalidRequest(_) => "invalid_request_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Backend { body, .. } => String::from_utf8_lossy(body).into_owned(),
            other => other.to_string(),
        }
    }
}
