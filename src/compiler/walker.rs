use async_recursion::async_recursion;
use tracing::{debug, trace};

use super::builder::DocumentBuilder;
use super::tags::{self, Attributes, TagKind};
use crate::ast::{Expression, Span};
use crate::error::{CompileError, CompileResult, ErrorKind, WithSpan};
use crate::eval::{ExpressionResolver, Scope, Value};
use crate::message::{Message, ToolCallReference};
use crate::template::{Attribute, TemplateNode, TemplateNodeKind};

/// Walks the markup tree depth-first, evaluating expressions and feeding the
/// [`DocumentBuilder`].
#[derive(Debug)]
pub struct NodeWalker {
    resolver: ExpressionResolver,
    builder: DocumentBuilder,
}

impl NodeWalker {
    pub fn new(resolver: ExpressionResolver, builder: DocumentBuilder) -> Self {
        Self { resolver, builder }
    }

    pub fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    #[async_recursion]
    pub async fn resolve_node(&mut self, node: &TemplateNode, scope: &mut Scope) -> CompileResult<()> {
        match &node.kind {
            TemplateNodeKind::Fragment { children } => self.resolve_children(children, scope).await,
            TemplateNodeKind::Text { data } => {
                self.builder.add_stray_text_at(data.as_str(), node.span);
                Ok(())
            }
            TemplateNodeKind::Comment { .. } => Ok(()),
            TemplateNodeKind::MustacheTag { expression } => {
                self.resolve_mustache(expression, node.span, scope).await
            }
            TemplateNodeKind::ElementTag {
                name,
                attributes,
                children,
                closed,
            } => {
                self.resolve_element(name, attributes, children, *closed, node, scope)
                    .await
            }
            TemplateNodeKind::ClosingTag { name } => self.resolve_closing_tag(name, node),
            TemplateNodeKind::IfBlock {
                expression,
                children,
                else_branch,
            } => {
                let test = self.resolver.resolve(expression, scope).await?;
                let branch = if test.is_truthy() {
                    Some(children)
                } else {
                    else_branch.as_ref()
                };
                match branch {
                    Some(branch) => self.resolve_block(branch, scope, &[]).await,
                    None => Ok(()),
                }
            }
            TemplateNodeKind::EachBlock {
                expression,
                item,
                index,
                children,
                else_branch,
            } => {
                self.resolve_each(expression, item, index.as_deref(), children, else_branch, scope)
                    .await
            }
        }
    }

    pub async fn resolve_children(
        &mut self,
        children: &[TemplateNode],
        scope: &mut Scope,
    ) -> CompileResult<()> {
        for child in children {
            self.resolve_node(child, scope).await?;
        }
        Ok(())
    }

    /// Walks `children` in a fresh child environment holding `bindings`.
    async fn resolve_block(
        &mut self,
        children: &[TemplateNode],
        scope: &mut Scope,
        bindings: &[(&str, Value)],
    ) -> CompileResult<()> {
        let checkpoint = scope.child();
        for (name, value) in bindings {
            scope.define(*name, value.clone());
        }
        let result = self.resolve_children(children, scope).await;
        scope.restore(checkpoint);
        result
    }

    async fn resolve_mustache(
        &mut self,
        expression: &Expression,
        span: Span,
        scope: &mut Scope,
    ) -> CompileResult<()> {
        let value = self.resolver.resolve(expression, scope).await?;
        if expression.is_assignment() {
            return Ok(());
        }
        self.builder.add_stray_text_at(value.to_string(), span);
        Ok(())
    }

    async fn resolve_element(
        &mut self,
        name: &str,
        attributes: &[Attribute],
        children: &[TemplateNode],
        closed: bool,
        node: &TemplateNode,
        scope: &mut Scope,
    ) -> CompileResult<()> {
        let span = node.span;
        let tag = tags::classify(name).at(span)?;
        let mut attributes = Attributes::resolve(name, attributes, &self.resolver, scope).await?;

        match tag {
            TagKind::Message(role) => {
                let role = tags::message_role(role, &mut attributes).at(span)?;
                attributes.check_message_fields().at(span)?;
                self.builder
                    .enter_message(role, attributes.into_json(), span)
                    .map_err(|kind| {
                        // root text rejected here is reported where it starts
                        let origin = self.builder.origin(&kind).unwrap_or(span);
                        CompileError::new(kind, origin)
                    })?;
                self.resolve_children(children, scope).await?;
                if closed {
                    self.builder.exit_message().at(span)?;
                }
            }
            TagKind::Content(kind) => {
                let kind = tags::content_kind(kind, &mut attributes).at(span)?;
                self.builder.enter_content(kind, span).at(span)?;
                self.resolve_children(children, scope).await?;
                if closed {
                    self.builder.exit_content().at(span)?;
                }
            }
            TagKind::ToolCall => {
                let value = tags::tool_call(attributes, children, span)?;
                trace!("tool call {} ({})", value.name, value.id);
                self.builder
                    .add_tool_call(ToolCallReference { span, value })
                    .at(span)?;
            }
        }
        Ok(())
    }

    fn resolve_closing_tag(&mut self, name: &str, node: &TemplateNode) -> CompileResult<()> {
        match tags::classify(name).at(node.span)? {
            TagKind::Message(_) => self.builder.exit_message().at(node.span),
            TagKind::Content(_) => self.builder.exit_content().at(node.span),
            TagKind::ToolCall => Err(CompileError::new(
                ErrorKind::InvalidToolCall("unexpected closing tag".to_string()),
                node.span,
            )),
        }
    }

    async fn resolve_each(
        &mut self,
        expression: &Expression,
        item: &str,
        index: Option<&str>,
        children: &[TemplateNode],
        else_branch: &Option<Vec<TemplateNode>>,
        scope: &mut Scope,
    ) -> CompileResult<()> {
        let iterable = self.resolver.resolve(expression, scope).await?;
        let entries: Vec<(Value, Value)> = match iterable {
            Value::Null => Vec::new(),
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, value)| (value, Value::Number(i as f64)))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(key, value)| (value, Value::String(key)))
                .collect(),
            other => {
                return Err(CompileError::new(
                    ErrorKind::NotIterable(other.type_name().to_string()),
                    expression.span,
                ))
            }
        };

        if entries.is_empty() {
            if let Some(else_branch) = else_branch {
                return self.resolve_block(else_branch, scope, &[]).await;
            }
            return Ok(());
        }

        debug!("each over {} entries as '{}'", entries.len(), item);
        for (value, position) in entries {
            let mut bindings = vec![(item, value)];
            if let Some(index) = index {
                bindings.push((index, position));
            }
            self.resolve_block(children, scope, &bindings).await?;
        }
        Ok(())
    }

    pub fn finish(self) -> CompileResult<Vec<Message>> {
        self.builder.finish()
    }
}
