//! Element tags the compiler understands.
//!
//! | tag                                   | meaning                         |
//! |---------------------------------------|---------------------------------|
//! | `message role=..`                     | message boundary                |
//! | `system`, `user`, `assistant`, `tool` | message boundary, role implied  |
//! | `content type=..`                     | content boundary                |
//! | `text`, `image`                       | content boundary, type implied  |
//! | `tool-call id=.. name=.. arguments=..`| tool call on an assistant message |

use indexmap::IndexMap;
use tracing::trace;

use crate::ast::Span;
use crate::error::{CompileError, CompileResult, ErrorKind, WithSpan};
use crate::eval::{ExpressionResolver, Scope, Value};
use crate::message::{ContentKind, Message, MessageRole, ToolCall};
use crate::template::{Attribute, AttributeValue, TemplateNode, TemplateNodeKind};

pub const MESSAGE_TAG: &str = "message";
pub const CONTENT_TAG: &str = "content";
pub const TOOL_CALL_TAG: &str = "tool-call";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `None` when the role comes from the `role` attribute.
    Message(Option<MessageRole>),
    /// `None` when the kind comes from the `type` attribute.
    Content(Option<ContentKind>),
    ToolCall,
}

pub fn classify(name: &str) -> Result<TagKind, ErrorKind> {
    match name {
        MESSAGE_TAG => Ok(TagKind::Message(None)),
        CONTENT_TAG => Ok(TagKind::Content(None)),
        TOOL_CALL_TAG => Ok(TagKind::ToolCall),
        _ => {
            if let Ok(role) = name.parse::<MessageRole>() {
                Ok(TagKind::Message(Some(role)))
            } else if let Ok(kind) = name.parse::<ContentKind>() {
                Ok(TagKind::Content(Some(kind)))
            } else {
                Err(ErrorKind::UnknownTag(name.to_string()))
            }
        }
    }
}

/// Evaluated attributes of one tag, in source order.
#[derive(Debug, Default)]
pub struct Attributes {
    tag: String,
    values: IndexMap<String, Value>,
}

impl Attributes {
    /// Evaluates every attribute. A lone interpolation keeps the type of its
    /// value; anything else is rendered and concatenated as text.
    pub async fn resolve(
        tag: &str,
        attributes: &[Attribute],
        resolver: &ExpressionResolver,
        scope: &mut Scope,
    ) -> CompileResult<Self> {
        let mut values = IndexMap::with_capacity(attributes.len());
        for attribute in attributes {
            let value = match &attribute.value {
                AttributeValue::Flag(flag) => Value::Boolean(*flag),
                AttributeValue::Parts(parts) => match parts.as_slice() {
                    [TemplateNode {
                        kind: TemplateNodeKind::MustacheTag { expression },
                        ..
                    }] => resolver.resolve(expression, scope).await?,
                    parts => {
                        let mut text = String::new();
                        for part in parts {
                            match &part.kind {
                                TemplateNodeKind::Text { data } => text.push_str(data),
                                TemplateNodeKind::MustacheTag { expression } => {
                                    let value = resolver.resolve(expression, scope).await?;
                                    text.push_str(&value.to_string());
                                }
                                other => trace!("ignoring {:?} in attribute {}", other, attribute.name),
                            }
                        }
                        Value::String(text)
                    }
                },
            };
            values.insert(attribute.name.clone(), value);
        }
        Ok(Self {
            tag: tag.to_string(),
            values,
        })
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    /// Removes a mandatory attribute, rendered as text.
    pub fn take_required(&mut self, name: &str) -> Result<String, ErrorKind> {
        self.take(name)
            .map(|value| value.to_string())
            .ok_or_else(|| ErrorKind::MissingAttribute {
                tag: self.tag.clone(),
                attribute: name.to_string(),
            })
    }

    /// Fails if a remaining attribute would overwrite a message field once
    /// the message is serialized.
    pub fn check_message_fields(&self) -> Result<(), ErrorKind> {
        match Message::RESERVED_FIELDS
            .iter()
            .find(|field| self.values.contains_key(**field))
        {
            Some(field) => Err(self.reserved(field)),
            None => Ok(()),
        }
    }

    fn reserved(&self, name: &str) -> ErrorKind {
        ErrorKind::ReservedAttribute {
            tag: self.tag.clone(),
            attribute: name.to_string(),
        }
    }

    /// The remaining attributes as JSON, for the message wire shape.
    pub fn into_json(self) -> IndexMap<String, serde_json::Value> {
        self.values
            .into_iter()
            .map(|(name, value)| (name, value.to_json()))
            .collect()
    }
}

/// Role of a message tag, reading the `role` attribute for `<message>`.
///
/// A shorthand tag may repeat its own role as an attribute; any other value
/// is rejected.
pub fn message_role(
    role: Option<MessageRole>,
    attributes: &mut Attributes,
) -> Result<MessageRole, ErrorKind> {
    let Some(implied) = role else {
        let role = attributes.take_required("role")?;
        return role
            .parse()
            .map_err(|_| ErrorKind::InvalidMessageRole(role));
    };
    match attributes.take("role") {
        None => Ok(implied),
        Some(value) if value.to_string() == implied.to_string() => Ok(implied),
        Some(_) => Err(attributes.reserved("role")),
    }
}

/// Kind of a content tag, reading the `type` attribute for `<content>`.
pub fn content_kind(
    kind: Option<ContentKind>,
    attributes: &mut Attributes,
) -> Result<ContentKind, ErrorKind> {
    if let Some(kind) = kind {
        return Ok(kind);
    }
    let kind = attributes.take_required("type")?;
    kind.parse()
        .map_err(|_| ErrorKind::InvalidContentType(kind))
}

/// Builds the tool call declared by a `<tool-call>` tag.
///
/// `arguments` must be a map, or a string holding a JSON object; it defaults
/// to an empty object.
pub fn tool_call(
    mut attributes: Attributes,
    children: &[TemplateNode],
    span: Span,
) -> CompileResult<ToolCall> {
    if !children.is_empty() {
        return Err(CompileError::new(
            ErrorKind::InvalidToolCall("tool calls cannot have content".to_string()),
            span,
        ));
    }
    let id = attributes.take_required("id").at(span)?;
    let name = attributes.take_required("name").at(span)?;
    let arguments = match attributes.take("arguments") {
        None | Some(Value::Null) => serde_json::Value::Object(serde_json::Map::new()),
        Some(value @ Value::Map(_)) => value.to_json(),
        Some(Value::String(raw)) => match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(parsed @ serde_json::Value::Object(_)) => parsed,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::InvalidToolCall(format!("arguments are not a JSON object: {}", raw)),
                    span,
                ))
            }
        },
        Some(other) => {
            return Err(CompileError::new(
                ErrorKind::InvalidToolCall(format!(
                    "arguments must be a map, found {}",
                    other.type_name()
                )),
                span,
            ))
        }
    };
    Ok(ToolCall {
        id,
        name,
        arguments,
    })
}
