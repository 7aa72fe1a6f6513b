//! Expression Evaluation
//!
//! Turns expression trees into runtime [`Value`]s. The compiler calls into this
//! module for every interpolation, attribute and control-block condition.
//!
//! # Core Components
//!
//! ## Expression Resolver
//! Evaluates every supported node kind, including short-circuiting logical and
//! optional-chain operators, assignments and calls.
//!
//! ## Scope
//! Nested variable environments. Blocks open a child environment and drop it
//! when they finish; assignments reach the environment that declared the name.
//!
//! ## Operators
//! JavaScript-flavoured coercion and comparison rules for binary and unary
//! operators, plus member reads and writes.
//!
//! ## Functions
//! The [`Callable`] trait for host functions and a [`FunctionRegistry`] that
//! installs named callables before a compilation.

pub mod expression;
pub mod function;
pub mod operators;
pub mod scope;
pub mod value;

pub use expression::ExpressionResolver;
pub use function::{Callable, FnCallable, FunctionRegistry};
pub use scope::{Scope, ScopeCheckpoint};
pub use value::Value;
