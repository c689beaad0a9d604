//! Recovery of function calls the model wrote inline as tagged JSON

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::chat::{FunctionCall, ToolCall};

static TOOL_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("must be valid regex"));

/// Completion text split into what the user sees and what the model called
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// `None` when no block parsed
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Why a tagged block was not accepted as a call
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no string `name`")]
    MissingName,
}

/// Pull every parseable `<tool_call>` block out of `text`
///
/// Blocks that fail to parse are skipped and stay in the visible text. When
/// nothing parses, `text` is returned as-is.
pub fn extract_tool_calls(text: &str) -> Extraction {
    let mut calls = Vec::new();
    let mut visible = String::with_capacity(text.len());
    let mut cursor = 0;

    for captures in TOOL_CALL_RE.captures_iter(text) {
        let (Some(block), Some(payload)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        match parse_payload(payload.as_str()) {
            Ok(function) => {
                visible.push_str(&text[cursor..block.start()]);
                cursor = block.end();
                calls.push(ToolCall {
                    id: call_id(),
                    kind: "function".to_owned(),
                    function,
                });
            }
            Err(error) => {
                tracing::debug!(error = %error, "skipping malformed tool call block");
            }
        }
    }

    if calls.is_empty() {
        return Extraction {
            text: text.to_owned(),
            tool_calls: None,
        };
    }

    visible.push_str(&text[cursor..]);

    Extraction {
        text: visible.trim().to_owned(),
        tool_calls: Some(calls),
    }
}

/// Parse the JSON inside one tagged block
///
/// `arguments` is re-serialized; a string value is taken to be JSON already
/// and passed through, and a missing or null value becomes `{}`.
pub fn parse_payload(payload: &str) -> Result<FunctionCall, PayloadError> {
    let Value::Object(mut object) = serde_json::from_str::<Value>(payload.trim())? else {
        return Err(PayloadError::NotAnObject);
    };

    let Some(Value::String(name)) = object.remove("name") else {
        return Err(PayloadError::MissingName);
    };

    let arguments = match object.remove("arguments") {
        None | Some(Value::Null) => "{}".to_owned(),
        Some(Value::String(raw)) => raw,
        Some(value) => value.to_string(),
    };

    Ok(FunctionCall { name, arguments })
}

fn call_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("call_{}", &hex[..12])
}
