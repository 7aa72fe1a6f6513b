use async_recursion::async_recursion;
use indexmap::IndexMap;
use tracing::debug;

use super::operators;
use super::scope::Scope;
use super::value::Value;
use crate::ast::{
    AssignmentOperator, CompoundOperation, Expression, ExpressionKind, LiteralValue, Property,
    Span, UpdateOperator,
};
use crate::error::{CompileError, CompileResult, ErrorKind, FunctionError, WithSpan};

/// Evaluates expression trees against a [`Scope`].
///
/// Evaluation is async because callables may suspend. Nothing is cached: an
/// expression is evaluated every time it is reached, so side effects (calls,
/// assignments) happen exactly as often as the template walks over them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionResolver {
    implicit_declarations: bool,
}

/// Where an assignment writes to.
enum Target {
    Identifier(String),
    Member { root: String, path: Vec<Value> },
}

impl Target {
    fn describe(&self) -> String {
        match self {
            Target::Identifier(name) => name.clone(),
            Target::Member { root, path } => path.iter().fold(root.clone(), |acc, key| {
                format!("{}[{}]", acc, key.to_key())
            }),
        }
    }
}

impl ExpressionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, assigning to an undeclared identifier declares it in the
    /// current environment instead of failing.
    pub fn with_implicit_declarations(mut self, enabled: bool) -> Self {
        self.implicit_declarations = enabled;
        self
    }

    pub async fn resolve(&self, expr: &Expression, scope: &mut Scope) -> CompileResult<Value> {
        Ok(self.resolve_link(expr, scope).await?.unwrap_or_default())
    }

    /// Evaluates `expr`; `None` means an optional link short-circuited and the
    /// rest of the chain must be skipped.
    #[async_recursion]
    async fn resolve_link(
        &self,
        expr: &Expression,
        scope: &mut Scope,
    ) -> CompileResult<Option<Value>> {
        let span = expr.span;
        let value = match &expr.kind {
            ExpressionKind::Literal { value } => Self::resolve_literal(value),
            ExpressionKind::Identifier { name } => scope.resolve(name).at(span)?,
            ExpressionKind::ObjectExpression { properties } => {
                self.resolve_object(properties, scope).await?
            }
            ExpressionKind::ArrayExpression { elements } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.resolve(element, scope).await?);
                }
                Value::List(items)
            }
            ExpressionKind::SequenceExpression { expressions } => {
                let mut last = Value::Null;
                for expression in expressions {
                    last = self.resolve(expression, scope).await?;
                }
                last
            }
            ExpressionKind::LogicalExpression {
                operator,
                left,
                right,
            } => {
                let left = self.resolve(left, scope).await?;
                if operators::short_circuits(*operator, &left) {
                    left
                } else {
                    self.resolve(right, scope).await?
                }
            }
            ExpressionKind::BinaryExpression {
                operator,
                left,
                right,
            } => {
                let left = self.resolve(left, scope).await?;
                let right = self.resolve(right, scope).await?;
                operators::binary(*operator, &left, &right).at(span)?
            }
            ExpressionKind::UnaryExpression { operator, argument } => {
                let argument = self.resolve(argument, scope).await?;
                operators::unary(*operator, &argument).at(span)?
            }
            ExpressionKind::AssignmentExpression {
                operator,
                left,
                right,
            } => self.resolve_assignment(*operator, left, right, span, scope).await?,
            ExpressionKind::UpdateExpression {
                operator,
                prefix,
                argument,
            } => self.resolve_update(*operator, *prefix, argument, span, scope).await?,
            ExpressionKind::MemberExpression {
                object,
                property,
                computed,
                optional,
            } => {
                let Some(object) = self.resolve_link(object, scope).await? else {
                    return Ok(None);
                };
                if *optional && object.is_null() {
                    return Ok(None);
                }
                let key = self.property_key(property, *computed, scope).await?;
                operators::get_member(&object, &key).at(span)?
            }
            ExpressionKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                if self.resolve(test, scope).await?.is_truthy() {
                    self.resolve(consequent, scope).await?
                } else {
                    self.resolve(alternate, scope).await?
                }
            }
            ExpressionKind::CallExpression {
                callee,
                arguments,
                optional,
            } => {
                let Some(callee) = self.resolve_link(callee, scope).await? else {
                    return Ok(None);
                };
                if *optional && callee.is_null() {
                    return Ok(None);
                }
                self.resolve_call(callee, arguments, expr, scope).await?
            }
            ExpressionKind::ChainExpression { expression } => self
                .resolve_link(expression, scope)
                .await?
                .unwrap_or_default(),
        };
        Ok(Some(value))
    }

    fn resolve_literal(literal: &LiteralValue) -> Value {
        match literal {
            LiteralValue::Null => Value::Null,
            LiteralValue::Boolean(b) => Value::Boolean(*b),
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::String(s) => Value::String(s.clone()),
        }
    }

    async fn resolve_object(
        &self,
        properties: &[Property],
        scope: &mut Scope,
    ) -> CompileResult<Value> {
        let mut map = IndexMap::with_capacity(properties.len());
        for property in properties {
            let key = if property.computed {
                match self.resolve(&property.key, scope).await? {
                    key @ (Value::String(_) | Value::Number(_)) => key.to_key(),
                    other => {
                        return Err(CompileError::new(
                            ErrorKind::InvalidObjectKey(other.type_name().to_string()),
                            property.key.span,
                        ))
                    }
                }
            } else {
                Self::static_key(&property.key)?
            };
            let value = self.resolve(&property.value, scope).await?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    /// Key of a non-computed property: `{ name: .. }`, `{ "name": .. }` or `{ 1: .. }`.
    fn static_key(key: &Expression) -> CompileResult<String> {
        match &key.kind {
            ExpressionKind::Identifier { name } => Ok(name.clone()),
            ExpressionKind::Literal { value } => Ok(Self::resolve_literal(value).to_key()),
            _ => Err(CompileError::new(
                ErrorKind::InvalidObjectKey(key.node_type().to_string()),
                key.span,
            )),
        }
    }

    async fn property_key(
        &self,
        property: &Expression,
        computed: bool,
        scope: &mut Scope,
    ) -> CompileResult<Value> {
        if computed {
            return self.resolve(property, scope).await;
        }
        Self::static_key(property).map(Value::String)
    }

    async fn resolve_call(
        &self,
        callee: Value,
        arguments: &[Expression],
        expr: &Expression,
        scope: &mut Scope,
    ) -> CompileResult<Value> {
        let callable = match callee {
            Value::Function(callable) => callable,
            other => {
                return Err(CompileError::new(
                    ErrorKind::NotCallable(other.type_name().to_string()),
                    expr.span,
                ))
            }
        };

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.resolve(argument, scope).await?);
        }

        debug!("calling function at {} with {} argument(s)", expr.span, args.len());
        callable.call(args).await.map_err(|e| match e {
            FunctionError::Compile(error) => error.or_at(expr.span),
            FunctionError::Failed(message) => {
                CompileError::new(ErrorKind::CallError(message), expr.span)
            }
        })
    }

    async fn resolve_assignment(
        &self,
        operator: AssignmentOperator,
        left: &Expression,
        right: &Expression,
        span: Span,
        scope: &mut Scope,
    ) -> CompileResult<Value> {
        let target = self.target(left, scope).await?;

        let value = match operator.compound() {
            None => self.resolve(right, scope).await?,
            Some(CompoundOperation::Logical(logical)) => {
                let current = Self::read_target(&target, scope).at(span)?;
                if operators::short_circuits(logical, &current) {
                    return Ok(current);
                }
                self.resolve(right, scope).await?
            }
            Some(CompoundOperation::Binary(binary)) => {
                let current = Self::read_target(&target, scope).at(span)?;
                let right = self.resolve(right, scope).await?;
                operators::binary(binary, &current, &right).at(span)?
            }
        };

        debug!("assign {} {} {:?}", target.describe(), operator, value);
        self.write_target(&target, value.clone(), scope).at(span)?;
        Ok(value)
    }

    async fn resolve_update(
        &self,
        operator: UpdateOperator,
        prefix: bool,
        argument: &Expression,
        span: Span,
        scope: &mut Scope,
    ) -> CompileResult<Value> {
        let target = self.target(argument, scope).await?;
        let old = Self::read_target(&target, scope)
            .and_then(|current| current.to_number())
            .at(span)?;
        let new = match operator {
            UpdateOperator::Increment => old + 1.0,
            UpdateOperator::Decrement => old - 1.0,
        };
        self.write_target(&target, Value::Number(new), scope).at(span)?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    /// Turns the left side of an assignment into a [`Target`]. Computed keys
    /// are evaluated innermost first.
    async fn target(&self, expr: &Expression, scope: &mut Scope) -> CompileResult<Target> {
        let mut keys = Vec::new();
        let mut node = expr;
        let root = loop {
            match &node.kind {
                ExpressionKind::Identifier { name } => break name.clone(),
                ExpressionKind::MemberExpression {
                    object,
                    property,
                    computed,
                    optional: false,
                } => {
                    keys.push((property.as_ref(), *computed));
                    node = object.as_ref();
                }
                _ => {
                    return Err(CompileError::new(
                        ErrorKind::InvalidAssignment(node.node_type().to_string()),
                        expr.span,
                    ))
                }
            }
        };
        if keys.is_empty() {
            return Ok(Target::Identifier(root));
        }

        let mut path = Vec::with_capacity(keys.len());
        for (property, computed) in keys.into_iter().rev() {
            path.push(self.property_key(property, computed, scope).await?);
        }
        Ok(Target::Member { root, path })
    }

    fn read_target(target: &Target, scope: &Scope) -> Result<Value, ErrorKind> {
        match target {
            Target::Identifier(name) => scope.resolve(name),
            Target::Member { root, path } => {
                let mut value = scope.resolve(root)?;
                for key in path {
                    value = operators::get_member(&value, key)?;
                }
                Ok(value)
            }
        }
    }

    fn write_target(&self, target: &Target, value: Value, scope: &mut Scope) -> Result<(), ErrorKind> {
        match target {
            Target::Identifier(name) => {
                if !scope.contains(name) && self.implicit_declarations {
                    scope.define(name.clone(), value);
                    return Ok(());
                }
                scope.assign(name, value)
            }
            Target::Member { root, path } => {
                let Some((last, parents)) = path.split_last() else {
                    return scope.assign(root, value);
                };
                let mut container = scope.binding_mut(root)?;
                for key in parents {
                    container = operators::member_mut(container, key)?;
                }
                operators::set_member(container, last, value)
            }
        }
    }
}
