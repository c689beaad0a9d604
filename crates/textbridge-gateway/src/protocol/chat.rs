//! Chat-completion wire format spoken to clients

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use super::completion::Usage;

// -- Request types --

/// Inbound chat completion request
///
/// Fields the gateway does not understand are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model name echoed back in responses
    #[serde(default)]
    pub model: Option<String>,
    /// Conversation, oldest first
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Functions the model may call
    #[serde(default)]
    pub tools: Option<Vec<ToolSpec>>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub top_k: Option<i32>,
    #[serde(default)]
    pub min_p: Option<f64>,
    #[serde(default)]
    pub repeat_penalty: Option<f64>,
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    /// Token limit, checked before `max_completion_tokens`
    ///
    /// Negative values pass through; the backend reads `-1` as unlimited.
    #[serde(default, deserialize_with = "lenient_int")]
    pub max_tokens: Option<i64>,
    /// Newer spelling of the token limit
    #[serde(default, deserialize_with = "lenient_int")]
    pub max_completion_tokens: Option<i64>,
    /// Extra stop sequences
    #[serde(default)]
    pub stop: Option<StopSequences>,
}

impl ChatCompletionRequest {
    /// Token limit from either accepted field, ignoring zero
    pub fn token_limit(&self) -> Option<i64> {
        self.max_tokens
            .filter(|&n| n != 0)
            .or(self.max_completion_tokens.filter(|&n| n != 0))
    }

    /// Declared tools, empty when none were sent
    pub fn tools(&self) -> &[ToolSpec] {
        self.tools.as_deref().unwrap_or_default()
    }
}

/// Integer field that clients sometimes send as a float (`256.0`)
///
/// Fractions are truncated toward zero.
#[allow(clippy::cast_possible_truncation)]
fn lenient_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let value = match number.as_i64() {
        Some(value) => value,
        None => match number.as_f64() {
            Some(value) if value.is_finite() && value.abs() < 9.0e18 => value as i64,
            _ => return Err(serde::de::Error::custom(format!("number {number} out of range"))),
        },
    };

    T::try_from(value)
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("number {value} out of range")))
}

/// `stop` may be a single string or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

impl StopSequences {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(stop) => vec![stop],
            Self::Many(stops) => stops,
        }
    }
}

/// Conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    fn parse(role: &str) -> Option<Self> {
        match role {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// Message within a chat request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// Raw role string; missing or unrecognized roles are skipped during formatting
    #[serde(default)]
    pub role: String,
    /// Text or content parts; null is treated as empty
    #[serde(default)]
    pub content: Option<MessageContent>,
    /// Function name, used on tool results
    #[serde(default)]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Convenience constructor for plain-text messages
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_owned(),
            content: Some(MessageContent::Text(content.to_owned())),
            name: None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    /// Text of the message, parts concatenated
    pub fn text(&self) -> String {
        self.content.as_ref().map(MessageContent::as_text).unwrap_or_default()
    }
}

/// Message content, either plain text or structured parts
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Join text parts; images and other part kinds carry no prompt text
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text.as_deref())
                .collect(),
        }
    }
}

/// One element of a multipart message
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Tool declaration, either `{"type": "function", "function": {...}}` or bare
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolSpec {
    Wrapped { function: FunctionDefinition },
    Bare(FunctionDefinition),
}

impl ToolSpec {
    pub const fn function(&self) -> &FunctionDefinition {
        match self {
            Self::Wrapped { function } | Self::Bare(function) => function,
        }
    }
}

/// Callable function, documented in the prompt but never executed here
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDefinition {
    #[serde(default = "unknown_function")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<ParameterSchema>,
}

fn unknown_function() -> String {
    "unknown".to_owned()
}

/// The parts of a JSON schema that end up in the prompt
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParameterSchema {
    /// Properties in declaration order
    #[serde(default)]
    pub properties: IndexMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertySchema {
    /// Usually a string, sometimes a list of type names
    #[serde(default, rename = "type")]
    pub kind: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PropertySchema {
    /// Human-readable type name, `any` when the schema omits it
    pub fn type_name(&self) -> String {
        match &self.kind {
            None | Some(serde_json::Value::Null) => "any".to_owned(),
            Some(serde_json::Value::String(kind)) => kind.clone(),
            Some(serde_json::Value::Array(kinds)) => kinds
                .iter()
                .map(|kind| kind.as_str().map_or_else(|| kind.to_string(), str::to_owned))
                .collect::<Vec<_>>()
                .join("|"),
            Some(other) => other.to_string(),
        }
    }
}

// -- Response types --

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
}

/// Outbound chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

impl ChatCompletionResponse {
    /// Wrap cleaned completion text into a single-choice response
    ///
    /// Any tool call switches the finish reason to `tool_calls`, and empty
    /// text next to tool calls is reported as null content.
    pub fn assemble(model: String, text: String, tool_calls: Option<Vec<ToolCall>>, usage: Usage) -> Self {
        let (message, finish_reason) = match tool_calls {
            Some(calls) => (
                AssistantMessage {
                    role: "assistant".to_owned(),
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: Some(calls),
                },
                FinishReason::ToolCalls,
            ),
            None => (
                AssistantMessage {
                    role: "assistant".to_owned(),
                    content: Some(text),
                    tool_calls: None,
                },
                FinishReason::Stop,
            ),
        };

        Self {
            id: completion_id(),
            object: "chat.completion".to_owned(),
            created: unix_now(),
            model,
            choices: vec![ChatChoice {
                index: 0,
                message,
                finish_reason,
            }],
            usage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Function invocation recovered from the completion text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Always `function`
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

// -- Streaming types --

/// Incremental chat completion event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDelta {
    pub content: String,
}

/// `chatcmpl-` followed by 12 hex digits
pub fn completion_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("chatcmpl-{}", &hex[..12])
}

/// Seconds since the unix epoch, zero if the clock is before it
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ignores_unknown_fields() {
        let request: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "qwen",
            "messages": [{"role": "user", "content": "hi", "tool_call_id": "x"}],
            "logprobs": true,
            "stream_options": {"include_usage": true}
        }))
        .unwrap();

        assert_eq!(request.model.as_deref(), Some("qwen"));
        assert_eq!(request.messages[0].text(), "hi");
    }

    #[test]
    fn token_limit_prefers_max_tokens() {
        let request = ChatCompletionRequest {
            max_tokens: Some(64),
            max_completion_tokens: Some(128),
            ..ChatCompletionRequest::default()
        };
        assert_eq!(request.token_limit(), Some(64));

        let request = ChatCompletionRequest {
            max_tokens: Some(0),
            max_completion_tokens: Some(128),
            ..ChatCompletionRequest::default()
        };
        assert_eq!(request.token_limit(), Some(128));
        assert_eq!(ChatCompletionRequest::default().token_limit(), None);
    }

    #[test]
    fn integral_floats_and_negative_limits_are_accepted() {
        let request: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 256.0,
            "top_k": 40.0
        }))
        .unwrap();

        assert_eq!(request.token_limit(), Some(256));
        assert_eq!(request.top_k, Some(40));

        let request: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "max_tokens": -1,
            "top_k": null
        }))
        .unwrap();

        assert_eq!(request.token_limit(), Some(-1));
        assert_eq!(request.top_k, None);
    }

    #[test]
    fn out_of_range_top_k_is_rejected() {
        let result: Result<ChatCompletionRequest, _> =
            serde_json::from_value(serde_json::json!({"top_k": 1e12}));

        assert!(result.is_err());
    }

    #[test]
    fn message_without_role_is_kept_but_unrecognized() {
        let request: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "messages": [{"content": "orphan"}, {"role": "user", "content": "hi"}]
        }))
        .unwrap();

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role(), None);
        assert_eq!(request.messages[1].role(), Some(Role::User));
    }

    #[test]
    fn stop_accepts_string_or_list() {
        let one: StopSequences = serde_json::from_str(r#""END""#).unwrap();
        assert_eq!(one.into_vec(), vec!["END"]);

        let many: StopSequences = serde_json::from_str(r#"["A", "B"]"#).unwrap();
        assert_eq!(many.into_vec(), vec!["A", "B"]);
    }

    #[test]
    fn content_parts_join_text_only() {
        let message: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "look at "},
                {"type": "image_url", "image_url": {"url": "http://x/y.png"}},
                {"type": "text", "text": "this"}
            ]
        }))
        .unwrap();

        assert_eq!(message.text(), "look at this");
    }

    #[test]
    fn null_content_is_empty() {
        let message: ChatMessage = serde_json::from_str(r#"{"role": "assistant", "content": null}"#).unwrap();
        assert_eq!(message.text(), "");
        assert_eq!(message.role(), Some(Role::Assistant));
    }

    #[test]
    fn tool_spec_accepts_wrapped_and_bare() {
        let tools: Vec<ToolSpec> = serde_json::from_value(serde_json::json!([
            {"type": "function", "function": {"name": "lookup", "description": "Find"}},
            {"name": "fetch"}
        ]))
        .unwrap();

        assert_eq!(tools[0].function().name, "lookup");
        assert_eq!(tools[1].function().name, "fetch");
    }

    #[test]
    fn property_type_names() {
        let schema: ParameterSchema = serde_json::from_value(serde_json::json!({
            "properties": {
                "q": {"type": "string"},
                "limit": {"type": ["integer", "null"]},
                "extra": {}
            }
        }))
        .unwrap();

        let names: Vec<String> = schema.properties.values().map(PropertySchema::type_name).collect();
        assert_eq!(names, vec!["string", "integer|null", "any"]);
    }

    #[test]
    fn assembled_response_with_tool_calls_has_null_content() {
        let call = ToolCall {
            id: "call_1".to_owned(),
            kind: "function".to_owned(),
            function: FunctionCall {
                name: "lookup".to_owned(),
                arguments: "{}".to_owned(),
            },
        };
        let response = ChatCompletionResponse::assemble("m".to_owned(), String::new(), Some(vec![call]), Usage::default());
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["choices"][0]["finish_reason"], "tool_calls");
        assert!(value["choices"][0]["message"]["content"].is_null());
        assert_eq!(value["choices"][0]["message"]["tool_calls"][0]["type"], "function");
        assert_eq!(value["usage"]["total_tokens"], 0);
    }

    #[test]
    fn completion_id_shape() {
        let id = completion_id();
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), "chatcmpl-".len() + 12);
    }
}
