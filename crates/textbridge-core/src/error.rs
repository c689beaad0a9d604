use http::StatusCode;
use serde_json::{Value, json};

/// Domain error that knows how to present itself over HTTP
///
/// Feature crates implement this for their error enums; the router decides
/// how the pieces are rendered, so domain code never touches axum types.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;

    /// `OpenAI`-style error envelope
    fn error_body(&self) -> Value {
        json!({
            "error": {
                "message": self.client_message(),
                "type": self.error_type(),
                "code": Value::Null,
            }
        })
    }
}
