//! Raw text-continuation wire format spoken to the backend

use serde::{Deserialize, Serialize};

// -- Request types --

/// Body of a backend `/v1/completions` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Full prompt text
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i32,
    pub min_p: f64,
    pub repeat_penalty: f64,
    pub presence_penalty: f64,
    /// Maximum tokens to generate
    pub n_predict: i64,
    /// Stop markers followed by any caller stops
    pub stop: Vec<String>,
    pub stream: bool,
}

// -- Response types --

/// Non-streaming backend response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Text of the first choice, empty if absent
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.text.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: Option<String>,
}

/// Token accounting, zero-filled when the backend omits fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

// -- Streaming types --

/// One `data:` record of a backend stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

impl CompletionChunk {
    /// Text of the first choice; `None` when the chunk has no choices
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.text.as_deref().unwrap_or_default())
    }
}
