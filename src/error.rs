use thiserror::Error;

use crate::ast::Span;

/// Every failure the compiler can report.
///
/// The variant name doubles as the machine-readable code, see [`CompileError::code`].
#[derive(Error, Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    // expressions
    #[error("Variable '{0}' is not declared")]
    UnboundIdentifier(String),
    #[error("Object is not callable, found {0}")]
    NotCallable(String),
    #[error("Error calling function: {0}")]
    CallError(String),
    #[error("Unsupported operator: {0}")]
    InvalidOperator(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Cannot read property '{0}' of null")]
    PropertyOfNull(String),
    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),
    #[error("Invalid assignment target: {0}")]
    InvalidAssignment(String),
    #[error("Value is not iterable: {0}")]
    NotIterable(String),

    // document structure
    #[error("Message tags cannot be nested")]
    NestedMessage,
    #[error("Closing message tag without an open message")]
    UnmatchedMessageClose,
    #[error("Content tags must be inside a message")]
    ContentOutsideMessage,
    #[error("Content tags cannot be nested")]
    NestedContent,
    #[error("Closing content tag without an open content block")]
    UnmatchedContentClose,
    #[error("Tool calls must be inside a message")]
    ToolCallOutsideMessage,
    #[error("Tool calls are only allowed in assistant messages, found a {0} message")]
    ToolCallOutsideAssistantMessage(String),
    #[error("Message tag is never closed")]
    UnclosedMessage,
    #[error("Content tag is never closed")]
    UnclosedContent,
    #[error("The {0} message has no content")]
    EmptyMessage(String),
    #[error("Text outside of a message is not allowed")]
    StrayTextOutsideMessage,

    // tags
    #[error("Unknown tag: <{0}>")]
    UnknownTag(String),
    #[error("Invalid message role: {0}")]
    InvalidMessageRole(String),
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),
    #[error("<{tag}> requires a '{attribute}' attribute")]
    MissingAttribute { tag: String, attribute: String },
    #[error("<{tag}> cannot set '{attribute}', it is a message field")]
    ReservedAttribute { tag: String, attribute: String },
    #[error("Invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("Compilation cancelled: {0}")]
    Cancelled(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// A compile failure with the span of the node that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        Self {
            kind,
            span: Some(span),
        }
    }

    pub fn code(&self) -> &'static str {
        (&self.kind).into()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Attaches `span` unless the error already points somewhere.
    pub fn or_at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }
}

impl From<ErrorKind> for CompileError {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, span: None }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Attaches a node span to errors raised by span-less layers (scope, builder).
pub trait WithSpan<T> {
    fn at(self, span: Span) -> CompileResult<T>;
}

impl<T> WithSpan<T> for Result<T, ErrorKind> {
    fn at(self, span: Span) -> CompileResult<T> {
        self.map_err(|kind| CompileError::new(kind, span))
    }
}

/// Failure returned by a user callable.
///
/// `Compile` carries an error that already has compiler context (for example a
/// callable that compiles another template) and passes through untouched.
#[derive(Error, Debug)]
pub enum FunctionError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{0}")]
    Failed(String),
}

impl FunctionError {
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Failed(message.into())
    }
}

impl From<ErrorKind> for FunctionError {
    fn from(kind: ErrorKind) -> Self {
        Self::Compile(CompileError::from(kind))
    }
}
