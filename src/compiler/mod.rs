//! Template Compilation
//!
//! Turns a parsed template into the chat messages it describes.
//!
//! # Components
//!
//! ## Compiler
//! The entry point. Owns the [`CompileOptions`] and the [`FunctionRegistry`],
//! prepares the root scope, and applies the timeout and cancellation policy.
//!
//! ## Node Walker
//! Depth-first walk over the markup tree. Text and interpolations become stray
//! text, element tags open and close boundaries, `if` and `each` blocks run in
//! child scopes.
//!
//! ## Document Builder
//! The state machine that owns every buffer and enforces nesting rules.
//!
//! # Example
//!
//! ```no_run
//! use promptc::ast::Expression;
//! use promptc::compiler::Compiler;
//! use promptc::eval::{Scope, Value};
//! use promptc::template::TemplateNode;
//!
//! # async fn run() -> promptc::error::CompileResult<()> {
//! let template = TemplateNode::element(
//!     "user",
//!     vec![],
//!     vec![
//!         TemplateNode::text("Hello "),
//!         TemplateNode::mustache(Expression::identifier("name")),
//!     ],
//! );
//! let scope = Scope::from_bindings([("name", Value::from("World"))]);
//! let messages = Compiler::new().compile(&template, scope).await?;
//! assert_eq!(messages[0].text(), "Hello World");
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod tags;
pub mod walker;

use futures::future::{AbortRegistration, Abortable};
use tracing::{debug, warn};

pub use builder::DocumentBuilder;
pub use walker::NodeWalker;

use crate::config::CompileOptions;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::eval::{ExpressionResolver, FunctionRegistry, Scope, Value};
use crate::message::Message;
use crate::template::TemplateNode;

#[derive(Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
    functions: FunctionRegistry,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            options,
            functions: FunctionRegistry::new(),
        }
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// Compiles `template` with `scope` as the root environment.
    ///
    /// Registered functions and the current-time binding are added to the
    /// root environment first. The scope is consumed: assignments made by the
    /// template are never visible to the caller.
    #[tracing::instrument(level = "debug", skip(self, template, scope))]
    pub async fn compile(&self, template: &TemplateNode, scope: Scope) -> CompileResult<Vec<Message>> {
        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(template, scope))
                .await
                .map_err(|_| {
                    warn!("compilation timed out after {}ms", limit.as_millis());
                    CompileError::from(ErrorKind::Cancelled(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    )))
                })?,
            None => self.run(template, scope).await,
        }
    }

    /// Like [`compile`](Self::compile), but resolves with `Cancelled` as soon
    /// as the matching [`futures::future::AbortHandle`] is aborted.
    pub async fn compile_abortable(
        &self,
        template: &TemplateNode,
        scope: Scope,
        registration: AbortRegistration,
    ) -> CompileResult<Vec<Message>> {
        Abortable::new(self.compile(template, scope), registration)
            .await
            .map_err(|_| CompileError::from(ErrorKind::Cancelled("aborted".to_string())))?
    }

    async fn run(&self, template: &TemplateNode, mut scope: Scope) -> CompileResult<Vec<Message>> {
        self.functions.install(&mut scope);
        if let Some(name) = &self.options.current_time_binding {
            let now = chrono::Utc::now().timestamp_millis();
            scope.define_global(name.as_str(), Value::from(now));
        }

        let resolver =
            ExpressionResolver::new().with_implicit_declarations(self.options.implicit_declarations);
        let mut walker = NodeWalker::new(resolver, DocumentBuilder::with_options(&self.options));
        walker.resolve_node(template, &mut scope).await?;
        let messages = walker.finish()?;
        debug!("compiled {} message(s)", messages.len());
        Ok(messages)
    }
}
