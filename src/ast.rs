//! Expression AST
//!
//! The compiler consumes expressions produced by an external parser. The node
//! shapes follow ESTree so a parser emitting ESTree JSON can be deserialized
//! directly:
//!
//! ```text
//! { "type": "BinaryExpression", "operator": "+", "start": 0, "end": 5,
//!   "left":  { "type": "Identifier", "name": "a", "start": 0, "end": 1 },
//!   "right": { "type": "Literal", "value": 1, "start": 4, "end": 5 } }
//! ```
//!
//! Only the node kinds the resolver understands are modelled. Each node owns
//! its children, so the tree has no cycles.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Byte offsets of a node in the template source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(flatten)]
    pub kind: ExpressionKind,
    #[serde(flatten)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "type")]
pub enum ExpressionKind {
    Literal {
        value: LiteralValue,
    },
    Identifier {
        name: String,
    },
    ObjectExpression {
        properties: Vec<Property>,
    },
    ArrayExpression {
        elements: Vec<Expression>,
    },
    SequenceExpression {
        expressions: Vec<Expression>,
    },
    LogicalExpression {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    BinaryExpression {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryExpression {
        operator: UnaryOperator,
        argument: Box<Expression>,
    },
    AssignmentExpression {
        operator: AssignmentOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UpdateExpression {
        operator: UpdateOperator,
        prefix: bool,
        argument: Box<Expression>,
    },
    MemberExpression {
        object: Box<Expression>,
        /// An `Identifier` naming the property unless `computed`.
        property: Box<Expression>,
        #[serde(default)]
        computed: bool,
        #[serde(default)]
        optional: bool,
    },
    ConditionalExpression {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    CallExpression {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        #[serde(default)]
        optional: bool,
    },
    ChainExpression {
        expression: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

/// An `ObjectExpression` entry. Non-computed keys are an `Identifier` or a `Literal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: Expression,
    pub value: Expression,
    #[serde(default)]
    pub computed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum LogicalOperator {
    #[serde(rename = "&&")]
    #[strum(serialize = "&&")]
    And,
    #[serde(rename = "||")]
    #[strum(serialize = "||")]
    Or,
    #[serde(rename = "??")]
    #[strum(serialize = "??")]
    NullishCoalescing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum BinaryOperator {
    #[serde(rename = "+")]
    #[strum(serialize = "+")]
    Add,
    #[serde(rename = "-")]
    #[strum(serialize = "-")]
    Subtract,
    #[serde(rename = "*")]
    #[strum(serialize = "*")]
    Multiply,
    #[serde(rename = "/")]
    #[strum(serialize = "/")]
    Divide,
    #[serde(rename = "%")]
    #[strum(serialize = "%")]
    Remainder,
    #[serde(rename = "**")]
    #[strum(serialize = "**")]
    Exponent,
    #[serde(rename = "==")]
    #[strum(serialize = "==")]
    Equal,
    #[serde(rename = "!=")]
    #[strum(serialize = "!=")]
    NotEqual,
    #[serde(rename = "===")]
    #[strum(serialize = "===")]
    StrictEqual,
    #[serde(rename = "!==")]
    #[strum(serialize = "!==")]
    StrictNotEqual,
    #[serde(rename = "<")]
    #[strum(serialize = "<")]
    LessThan,
    #[serde(rename = "<=")]
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[serde(rename = ">")]
    #[strum(serialize = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[serde(rename = "<<")]
    #[strum(serialize = "<<")]
    ShiftLeft,
    #[serde(rename = ">>")]
    #[strum(serialize = ">>")]
    ShiftRight,
    #[serde(rename = ">>>")]
    #[strum(serialize = ">>>")]
    UnsignedShiftRight,
    #[serde(rename = "&")]
    #[strum(serialize = "&")]
    BitAnd,
    #[serde(rename = "|")]
    #[strum(serialize = "|")]
    BitOr,
    #[serde(rename = "^")]
    #[strum(serialize = "^")]
    BitXor,
    #[serde(rename = "in")]
    #[strum(serialize = "in")]
    In,
    #[serde(rename = "instanceof")]
    #[strum(serialize = "instanceof")]
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum UnaryOperator {
    #[serde(rename = "-")]
    #[strum(serialize = "-")]
    Minus,
    #[serde(rename = "+")]
    #[strum(serialize = "+")]
    Plus,
    #[serde(rename = "!")]
    #[strum(serialize = "!")]
    Not,
    #[serde(rename = "~")]
    #[strum(serialize = "~")]
    BitNot,
    #[serde(rename = "typeof")]
    #[strum(serialize = "typeof")]
    TypeOf,
    #[serde(rename = "void")]
    #[strum(serialize = "void")]
    Void,
    #[serde(rename = "delete")]
    #[strum(serialize = "delete")]
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum AssignmentOperator {
    #[serde(rename = "=")]
    #[strum(serialize = "=")]
    Assign,
    #[serde(rename = "+=")]
    #[strum(serialize = "+=")]
    AddAssign,
    #[serde(rename = "-=")]
    #[strum(serialize = "-=")]
    SubtractAssign,
    #[serde(rename = "*=")]
    #[strum(serialize = "*=")]
    MultiplyAssign,
    #[serde(rename = "/=")]
    #[strum(serialize = "/=")]
    DivideAssign,
    #[serde(rename = "%=")]
    #[strum(serialize = "%=")]
    RemainderAssign,
    #[serde(rename = "**=")]
    #[strum(serialize = "**=")]
    ExponentAssign,
    #[serde(rename = "<<=")]
    #[strum(serialize = "<<=")]
    ShiftLeftAssign,
    #[serde(rename = ">>=")]
    #[strum(serialize = ">>=")]
    ShiftRightAssign,
    #[serde(rename = ">>>=")]
    #[strum(serialize = ">>>=")]
    UnsignedShiftRightAssign,
    #[serde(rename = "&=")]
    #[strum(serialize = "&=")]
    BitAndAssign,
    #[serde(rename = "|=")]
    #[strum(serialize = "|=")]
    BitOrAssign,
    #[serde(rename = "^=")]
    #[strum(serialize = "^=")]
    BitXorAssign,
    #[serde(rename = "&&=")]
    #[strum(serialize = "&&=")]
    AndAssign,
    #[serde(rename = "||=")]
    #[strum(serialize = "||=")]
    OrAssign,
    #[serde(rename = "??=")]
    #[strum(serialize = "??=")]
    NullishAssign,
}

/// How a compound assignment combines the current and the new value.
pub enum CompoundOperation {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

impl AssignmentOperator {
    /// `None` for plain `=`.
    pub fn compound(&self) -> Option<CompoundOperation> {
        use CompoundOperation::{Binary, Logical};
        Some(match self {
            Self::Assign => return None,
            Self::AddAssign => Binary(BinaryOperator::Add),
            Self::SubtractAssign => Binary(BinaryOperator::Subtract),
            Self::MultiplyAssign => Binary(BinaryOperator::Multiply),
            Self::DivideAssign => Binary(BinaryOperator::Divide),
            Self::RemainderAssign => Binary(BinaryOperator::Remainder),
            Self::ExponentAssign => Binary(BinaryOperator::Exponent),
            Self::ShiftLeftAssign => Binary(BinaryOperator::ShiftLeft),
            Self::ShiftRightAssign => Binary(BinaryOperator::ShiftRight),
            Self::UnsignedShiftRightAssign => Binary(BinaryOperator::UnsignedShiftRight),
            Self::BitAndAssign => Binary(BinaryOperator::BitAnd),
            Self::BitOrAssign => Binary(BinaryOperator::BitOr),
            Self::BitXorAssign => Binary(BinaryOperator::BitXor),
            Self::AndAssign => Logical(LogicalOperator::And),
            Self::OrAssign => Logical(LogicalOperator::Or),
            Self::NullishAssign => Logical(LogicalOperator::NullishCoalescing),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum UpdateOperator {
    #[serde(rename = "++")]
    #[strum(serialize = "++")]
    Increment,
    #[serde(rename = "--")]
    #[strum(serialize = "--")]
    Decrement,
}

// Constructors for hosts that build trees in code. Spans default to 0..0;
// use `with_span` to attach one.
impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Span::new(start, end);
        self
    }

    /// ESTree node type name, used in diagnostics.
    pub fn node_type(&self) -> &'static str {
        (&self.kind).into()
    }

    pub fn null() -> Self {
        Self::new(ExpressionKind::Literal {
            value: LiteralValue::Null,
        })
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExpressionKind::Literal {
            value: LiteralValue::Boolean(value),
        })
    }

    pub fn number(value: f64) -> Self {
        Self::new(ExpressionKind::Literal {
            value: LiteralValue::Number(value),
        })
    }

    pub fn string<S: Into<String>>(value: S) -> Self {
        Self::new(ExpressionKind::Literal {
            value: LiteralValue::String(value.into()),
        })
    }

    pub fn identifier<S: Into<String>>(name: S) -> Self {
        Self::new(ExpressionKind::Identifier { name: name.into() })
    }

    pub fn array(elements: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::ArrayExpression { elements })
    }

    /// Object literal with plain (non-computed) keys.
    pub fn object<S: Into<String>>(entries: Vec<(S, Expression)>) -> Self {
        let properties = entries
            .into_iter()
            .map(|(key, value)| Property {
                key: Expression::identifier(key),
                value,
                computed: false,
            })
            .collect();
        Self::new(ExpressionKind::ObjectExpression { properties })
    }

    pub fn sequence(expressions: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::SequenceExpression { expressions })
    }

    pub fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Self {
        Self::new(ExpressionKind::LogicalExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::new(ExpressionKind::BinaryExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(operator: UnaryOperator, argument: Expression) -> Self {
        Self::new(ExpressionKind::UnaryExpression {
            operator,
            argument: Box::new(argument),
        })
    }

    pub fn assign(operator: AssignmentOperator, left: Expression, right: Expression) -> Self {
        Self::new(ExpressionKind::AssignmentExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn update(operator: UpdateOperator, prefix: bool, argument: Expression) -> Self {
        Self::new(ExpressionKind::UpdateExpression {
            operator,
            prefix,
            argument: Box::new(argument),
        })
    }

    /// `object.name`
    pub fn member<S: Into<String>>(object: Expression, name: S) -> Self {
        Self::new(ExpressionKind::MemberExpression {
            object: Box::new(object),
            property: Box::new(Expression::identifier(name)),
            computed: false,
            optional: false,
        })
    }

    /// `object?.name`
    pub fn optional_member<S: Into<String>>(object: Expression, name: S) -> Self {
        Self::new(ExpressionKind::MemberExpression {
            object: Box::new(object),
            property: Box::new(Expression::identifier(name)),
            computed: false,
            optional: true,
        })
    }

    /// `object[property]`
    pub fn index(object: Expression, property: Expression) -> Self {
        Self::new(ExpressionKind::MemberExpression {
            object: Box::new(object),
            property: Box::new(property),
            computed: true,
            optional: false,
        })
    }

    pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Self {
        Self::new(ExpressionKind::ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    pub fn call(callee: Expression, arguments: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::CallExpression {
            callee: Box::new(callee),
            arguments,
            optional: false,
        })
    }

    /// `callee?.(arguments)`
    pub fn optional_call(callee: Expression, arguments: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::CallExpression {
            callee: Box::new(callee),
            arguments,
            optional: true,
        })
    }

    pub fn chain(expression: Expression) -> Self {
        Self::new(ExpressionKind::ChainExpression {
            expression: Box::new(expression),
        })
    }

    /// Assignments and updates are statements in a template: they print nothing.
    pub fn is_assignment(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::AssignmentExpression { .. } | ExpressionKind::UpdateExpression { .. }
        )
    }
}
