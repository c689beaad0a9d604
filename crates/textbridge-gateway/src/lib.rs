//! Chat-completion gateway for a text-continuation backend
//!
//! Chat requests are rewritten as plain continuation prompts free of the
//! backend's reserved tokens, sent to the backend's `/v1/completions`
//! endpoint, and the reply (streamed or whole) is translated back into the
//! chat-completion format. Whole replies are cleaned of degenerate output and
//! have inline tool calls extracted.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod backend;
pub mod error;
pub mod prompt;
pub mod protocol;
#[cfg(feature = "http")]
pub mod router;
pub mod sanitize;
pub mod stream;
pub mod tokens;
pub mod tool_call;

pub use backend::BackendClient;
pub use error::GatewayError;
#[cfg(feature = "http")]
pub use router::{GatewayState, gateway_router};
pub use stream::{StreamEvent, StreamTranslator};
