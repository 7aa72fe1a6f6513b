use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::Span;
use crate::config::{CompileOptions, RootTextPolicy};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::message::{ContentKind, Message, MessageContent, MessageRole, ToolCallReference};

/// Accumulates text, content items, tool calls and finished messages while a
/// template is walked.
///
/// The open message and open content boundary are the whole state; every
/// structural error is raised by one of the transition methods below.
/// Transition errors carry no span, the caller knows which node it was
/// handling. Errors about an earlier node (an unclosed tag, rejected root
/// text) are located with [`origin`](Self::origin).
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    root_text: RootTextPolicy,
    allow_empty_messages: bool,

    message: Option<OpenMessage>,
    content: Option<OpenContent>,

    /// First non-blank text added outside of any message.
    root_text_span: Option<Span>,
    stray_text: Vec<String>,
    items: Vec<MessageContent>,
    tool_calls: Vec<ToolCallReference>,
    messages: Vec<Message>,
}

#[derive(Debug)]
struct OpenMessage {
    role: MessageRole,
    attributes: IndexMap<String, serde_json::Value>,
    span: Span,
}

#[derive(Debug, Clone, Copy)]
struct OpenContent {
    kind: ContentKind,
    span: Span,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: &CompileOptions) -> Self {
        Self {
            root_text: options.root_text,
            allow_empty_messages: options.allow_empty_messages,
            ..Self::default()
        }
    }

    pub fn is_inside_message(&self) -> bool {
        self.message.is_some()
    }

    pub fn is_inside_content(&self) -> bool {
        self.content.is_some()
    }

    /// Role of the open message, if any.
    pub fn current_role(&self) -> Option<MessageRole> {
        self.message.as_ref().map(|message| message.role)
    }

    pub fn enter_message(
        &mut self,
        role: MessageRole,
        attributes: IndexMap<String, serde_json::Value>,
        span: Span,
    ) -> Result<(), ErrorKind> {
        if self.is_inside_message() {
            return Err(ErrorKind::NestedMessage);
        }
        self.group_content()?;
        trace!("enter {} message at {}", role, span);
        self.message = Some(OpenMessage {
            role,
            attributes,
            span,
        });
        self.items.clear();
        self.tool_calls.clear();
        Ok(())
    }

    /// Closes the open message, force-closing an open content boundary first.
    pub fn exit_message(&mut self) -> Result<(), ErrorKind> {
        if !self.is_inside_message() {
            return Err(ErrorKind::UnmatchedMessageClose);
        }
        if self.is_inside_content() {
            self.exit_content()?;
        }
        self.group_stray_text();

        let content = self.pop_content();
        let tool_calls = self.pop_tool_calls();
        let Some(open) = self.message.take() else {
            return Err(ErrorKind::UnmatchedMessageClose);
        };
        if content.is_empty() && tool_calls.is_empty() && !self.allow_empty_messages {
            return Err(ErrorKind::EmptyMessage(open.role.to_string()));
        }

        let content = match (open.role, open.attributes.get("id")) {
            (MessageRole::Tool, Some(id)) => {
                let tool_call_id = json_text(id);
                let tool_name = open.attributes.get("name").map(json_text);
                into_tool_results(content, &tool_call_id, tool_name)
            }
            _ => content,
        };

        let mut message = Message::new(open.role, content);
        message.tool_calls = tool_calls.into_iter().map(|r| r.value).collect();
        message.attributes = open.attributes;
        debug!(
            "built {} message with {} content item(s)",
            message.role,
            message.content.len()
        );
        self.messages.push(message);
        Ok(())
    }

    pub fn enter_content(&mut self, kind: ContentKind, span: Span) -> Result<(), ErrorKind> {
        if !self.is_inside_message() {
            return Err(ErrorKind::ContentOutsideMessage);
        }
        if self.is_inside_content() {
            return Err(ErrorKind::NestedContent);
        }
        self.group_stray_text();
        self.content = Some(OpenContent { kind, span });
        Ok(())
    }

    /// Turns the text collected since [`enter_content`](Self::enter_content)
    /// into one item of the open kind. Whitespace is kept verbatim here.
    pub fn exit_content(&mut self) -> Result<(), ErrorKind> {
        let open = self.content.take().ok_or(ErrorKind::UnmatchedContentClose)?;
        let text = self.pop_stray_text();
        if !text.is_empty() {
            self.items.push(MessageContent::from_kind(open.kind, text));
        }
        Ok(())
    }

    pub fn add_stray_text<S: Into<String>>(&mut self, text: S) {
        let text = text.into();
        if !text.is_empty() {
            self.stray_text.push(text);
        }
    }

    /// Like [`add_stray_text`](Self::add_stray_text), remembering where
    /// text outside of any message starts.
    pub fn add_stray_text_at<S: Into<String>>(&mut self, text: S, span: Span) {
        let text = text.into();
        if self.root_text_span.is_none() && !self.is_inside_message() && !text.trim().is_empty() {
            self.root_text_span = Some(span);
        }
        self.add_stray_text(text);
    }

    /// Flushes pending stray text into a text item. Whitespace-only text is
    /// dropped; it only ever comes from markup indentation.
    ///
    /// Inside an open content boundary this does nothing: the text belongs to
    /// that boundary and is grouped when it closes.
    pub fn group_stray_text(&mut self) {
        if self.is_inside_content() {
            return;
        }
        let text = self.pop_stray_text();
        if !text.trim().is_empty() {
            self.items.push(MessageContent::text(text));
        }
    }

    pub fn pop_stray_text(&mut self) -> String {
        std::mem::take(&mut self.stray_text).concat()
    }

    pub fn add_content(&mut self, item: MessageContent) -> Result<(), ErrorKind> {
        if self.is_inside_content() {
            return Err(ErrorKind::NestedContent);
        }
        self.group_stray_text();
        self.items.push(item);
        Ok(())
    }

    pub fn pop_content(&mut self) -> Vec<MessageContent> {
        std::mem::take(&mut self.items)
    }

    /// Handles content accumulated outside of any message according to the
    /// root text policy. Does nothing while a message is open.
    pub fn group_content(&mut self) -> Result<(), ErrorKind> {
        if self.is_inside_message() {
            return Ok(());
        }
        self.group_stray_text();
        if self.items.is_empty() {
            return Ok(());
        }
        match self.root_text {
            RootTextPolicy::System => {
                let content = self.pop_content();
                debug!("grouping {} root item(s) into a system message", content.len());
                self.messages.push(Message::new(MessageRole::System, content));
            }
            RootTextPolicy::Discard => self.items.clear(),
            RootTextPolicy::Reject => return Err(ErrorKind::StrayTextOutsideMessage),
        }
        self.root_text_span = None;
        Ok(())
    }

    pub fn add_tool_call(&mut self, reference: ToolCallReference) -> Result<(), ErrorKind> {
        let role = self.current_role().ok_or(ErrorKind::ToolCallOutsideMessage)?;
        if self.is_inside_content() {
            return Err(ErrorKind::NestedContent);
        }
        if role != MessageRole::Assistant {
            return Err(ErrorKind::ToolCallOutsideAssistantMessage(role.to_string()));
        }
        self.tool_calls.push(reference);
        Ok(())
    }

    pub fn pop_tool_calls(&mut self) -> Vec<ToolCallReference> {
        std::mem::take(&mut self.tool_calls)
    }

    /// Appends an already assembled message.
    pub fn add_message(&mut self, message: Message) -> Result<(), ErrorKind> {
        if self.is_inside_message() {
            return Err(ErrorKind::NestedMessage);
        }
        self.group_content()?;
        self.messages.push(message);
        Ok(())
    }

    /// Span of the node an error about earlier input refers to: the open
    /// message or content tag, or the first rejected root text.
    pub fn origin(&self, kind: &ErrorKind) -> Option<Span> {
        match kind {
            ErrorKind::UnclosedMessage => self.message.as_ref().map(|open| open.span),
            ErrorKind::UnclosedContent => self.content.map(|open| open.span),
            ErrorKind::StrayTextOutsideMessage => self.root_text_span,
            _ => None,
        }
    }

    /// Ends the walk and returns the messages in document order.
    pub fn finish(mut self) -> CompileResult<Vec<Message>> {
        let located = |builder: &Self, kind: ErrorKind| CompileError {
            span: builder.origin(&kind),
            kind,
        };
        if self.is_inside_content() {
            return Err(located(&self, ErrorKind::UnclosedContent));
        }
        if self.is_inside_message() {
            return Err(located(&self, ErrorKind::UnclosedMessage));
        }
        if let Err(kind) = self.group_content() {
            return Err(located(&self, kind));
        }
        Ok(self.messages)
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn into_tool_results(
    content: Vec<MessageContent>,
    tool_call_id: &str,
    tool_name: Option<String>,
) -> Vec<MessageContent> {
    content
        .into_iter()
        .map(|item| match item {
            MessageContent::Text { text } => MessageContent::ToolResult {
                tool_call_id: tool_call_id.to_string(),
                tool_name: tool_name.clone(),
                result: text,
                is_error: false,
            },
            other => other,
        })
        .collect()
}
