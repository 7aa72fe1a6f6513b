use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use super::scope::Scope;
use super::value::Value;
use crate::error::FunctionError;

/// A function value reachable from expressions.
///
/// Implementations may suspend (fetch data, compile a nested template, ...).
/// Returning [`FunctionError::Compile`] passes a compile error through to the
/// caller unchanged; any other failure is reported as a `CallError` at the
/// call site.
#[mockall::automock]
#[async_trait]
pub trait Callable: Send + Sync {
    async fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError>;
}

type BoxedFn = Box<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, FunctionError>> + Send + Sync>;

/// Adapts a closure into a [`Callable`].
pub struct FnCallable {
    f: BoxedFn,
}

impl FnCallable {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
    {
        Self {
            f: Box::new(move |args| f(args).boxed()),
        }
    }

    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self {
            f: Box::new(move |args| futures::future::ready(f(args)).boxed()),
        }
    }
}

#[async_trait]
impl Callable for FnCallable {
    async fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        (self.f)(args).await
    }
}

impl Value {
    /// Wraps an async closure as a function value.
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
    {
        Value::Function(Arc::new(FnCallable::new(f)))
    }

    /// Wraps a plain closure as a function value.
    pub fn sync_function<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Value::Function(Arc::new(FnCallable::sync(f)))
    }
}

/// Named callables installed into the root scope before a compilation.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Arc<dyn Callable>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Into<String>>(&mut self, name: S, callable: Arc<dyn Callable>) -> &mut Self {
        self.functions.insert(name.into(), callable);
        self
    }

    pub fn register_fn<S, F, Fut>(&mut self, name: S, f: F) -> &mut Self
    where
        S: Into<String>,
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
    {
        self.register(name, Arc::new(FnCallable::new(f)))
    }

    pub fn register_sync<S, F>(&mut self, name: S, f: F) -> &mut Self
    where
        S: Into<String>,
        F: Fn(Vec<Value>) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnCallable::sync(f)))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Callable>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Binds every function into the root environment of `scope`.
    pub fn install(&self, scope: &mut Scope) {
        for (name, callable) in &self.functions {
            scope.define_global(name, Value::Function(callable.clone()));
        }
    }
}
