//! # promptc: prompt template compiler
//!
//! Compiles a parsed prompt template into the ordered list of chat messages it
//! describes. The template is a markup tree (text, interpolations, message and
//! content tags, `if`/`each` blocks) with embedded expression trees.
//!
//! ## Pipeline
//!
//! ```text
//! TemplateNode ──▶ NodeWalker ──▶ DocumentBuilder ──▶ Vec<Message>
//!                      │
//!                      ▼
//!              ExpressionResolver ◀──▶ Scope
//!                      │
//!                      ▼
//!                  Callable (host functions, may suspend)
//! ```
//!
//! Parsing the template source is not part of this crate: [`template`] and
//! [`ast`] describe the trees a parser hands over, and both deserialize from
//! ESTree-style JSON.
//!
//! ## Modules
//!
//! - [`compiler`]: the [`Compiler`] entry point, the node walker and the
//!   document builder state machine
//! - [`eval`]: values, scopes, operators, the expression resolver and callables
//! - [`message`]: the compiled output
//! - [`config`]: [`CompileOptions`]
//! - [`error`]: [`CompileError`] with a machine-readable code and the span of
//!   the offending node
//!
//! A compilation either returns every message or exactly one error; there are
//! no partial results.

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod eval;
pub mod message;
pub mod template;

// Re-exports
pub use compiler::Compiler;
pub use config::{CompileOptions, RootTextPolicy};
pub use error::{CompileError, CompileResult, ErrorKind, FunctionError};
pub use eval::{Callable, FunctionRegistry, Scope, Value};
pub use message::{ContentKind, Message, MessageContent, MessageRole, ToolCall};
pub use template::TemplateNode;
