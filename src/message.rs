//! Compiled chat messages, in the shape chat-completion APIs expect.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::Span;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// The kind of an explicit content boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ContentKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Image {
        image: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        tool_name: Option<String>,
        result: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text { text: text.into() }
    }

    /// Builds the item a content boundary of `kind` produces from its text.
    pub fn from_kind(kind: ContentKind, text: String) -> Self {
        match kind {
            ContentKind::Text => Self::Text { text },
            ContentKind::Image => Self::Image { image: text },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// A tool call together with the tag that declared it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallReference {
    pub span: Span,
    pub value: ToolCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<MessageContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Extra tag attributes, e.g. `name` on user messages. Keys never repeat
    /// one of [`Message::RESERVED_FIELDS`].
    #[serde(flatten)]
    pub attributes: IndexMap<String, serde_json::Value>,
}

impl Message {
    /// Wire names of the fields the flattened attributes would collide with.
    pub const RESERVED_FIELDS: [&'static str; 3] = ["role", "content", "toolCalls"];

    pub fn new(role: MessageRole, content: Vec<MessageContent>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            attributes: IndexMap::new(),
        }
    }

    /// Concatenation of every text item, in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
