//! Chat conversation to continuation prompt
//!
//! The backend is asked to continue a plain document rather than a chat
//! template. The document reads as a header, optional function reference,
//! prior turns, the current task and finally [`CONTINUATION_TRIGGER`].

use crate::protocol::chat::{ChatMessage, Role, ToolSpec};
use crate::tokens;

/// Final paragraph of every prompt; the backend writes its answer after it
pub const CONTINUATION_TRIGGER: &str = "Complete response:\n";

/// Document-boundary markers, always the leading stop sequences
pub const STOP_MARKERS: [&str; 2] = ["Task:", "\n\nTask:"];

const PARAGRAPH_BREAK: &str = "\n\n";

/// A conversation turn that survives into the prompt
enum Turn {
    User(String),
    Assistant(String),
    /// Already rendered as `[name returned: content]`
    Tool(String),
}

impl Turn {
    fn from_message(message: &ChatMessage) -> Option<Self> {
        let content = message.text();

        match message.role()? {
            Role::System => None,
            Role::User => Some(Self::User(content)),
            Role::Assistant => Some(Self::Assistant(content)),
            Role::Tool => {
                let name = message.name.as_deref().unwrap_or("function");
                Some(Self::Tool(format!("[{name} returned: {content}]")))
            }
        }
    }

    fn into_history(self) -> String {
        match self {
            Self::User(content) => format!("Task: {content}"),
            Self::Assistant(content) | Self::Tool(content) => content,
        }
    }

    fn into_current(self) -> Option<String> {
        match self {
            Self::User(content) => Some(format!("Task: {content}")),
            Self::Tool(content) => Some(content),
            Self::Assistant(_) => None,
        }
    }
}

/// Build the continuation prompt for a conversation
///
/// The result never contains a reserved token literal, whatever the messages
/// or tool descriptions hold.
pub fn format_prompt(messages: &[ChatMessage], tools: &[ToolSpec]) -> String {
    let mut paragraphs = Vec::new();

    let header = messages
        .iter()
        .find(|message| message.role() == Some(Role::System))
        .map(ChatMessage::text)
        .filter(|text| !text.is_empty());

    if let Some(header) = header {
        paragraphs.push(header);
    }

    if !tools.is_empty() {
        paragraphs.push(render_tools(tools));
    }

    let mut turns: Vec<Turn> = messages.iter().filter_map(Turn::from_message).collect();

    if let Some(current) = turns.pop() {
        paragraphs.extend(turns.into_iter().map(Turn::into_history));
        paragraphs.extend(current.into_current());
    }

    paragraphs.push(CONTINUATION_TRIGGER.to_owned());

    tokens::strip_all(&paragraphs.join(PARAGRAPH_BREAK), &tokens::RESERVED)
}

/// Plain-text reference of the callable functions
pub fn render_tools(tools: &[ToolSpec]) -> String {
    let mut lines = vec!["Available functions:".to_owned()];

    for tool in tools {
        let function = tool.function();
        let description = function.description.as_deref().unwrap_or_default();
        lines.push(format!("\n- {}: {description}", function.name));

        let Some(parameters) = &function.parameters else {
            continue;
        };

        for (name, property) in &parameters.properties {
            let required = if parameters.required.contains(name) {
                " (required)"
            } else {
                ""
            };
            let description = property.description.as_deref().unwrap_or_default();

            lines.push(format!("  - {name}: {}{required} — {description}", property.type_name()));
        }
    }

    lines.push(
        "\nTo call a function, output: <tool_call>{\"name\": \"function_name\", \"arguments\": {...}}</tool_call>"
            .to_owned(),
    );

    lines.join("\n")
}
