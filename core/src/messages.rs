use serde::{Deserialize, Serialize};

use crate::classify::detect_input_type;

pub const TOOL_ADVISORY_PREFIX: &str = "Use the following tools for this request: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the conversation sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

// [system prompt for the detected input type, user text]
pub fn build_messages(text: &str) -> Vec<Message> {
    let input_type = detect_input_type(text);
    vec![
        Message::system(input_type.system_prompt()),
        Message::user(text),
    ]
}

/// Same as [`build_messages`], preceded by a system message naming the
/// detected tools when there are any.
pub fn build_messages_with_tools(text: &str, tools: &[String]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(3);
    if !tools.is_empty() {
        messages.push(Message::system(format!("{}{}", TOOL_ADVISORY_PREFIX, tools.join(", "))));
    }
    messages.extend(build_messages(text));
    messages
}
