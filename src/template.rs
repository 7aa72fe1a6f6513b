//! Markup AST
//!
//! The parsed template document. It is produced by an external parser and
//! only read here. Tags are kept generic (`ElementTag`); the walker decides
//! which ones are message or content boundaries.

use serde::{Deserialize, Serialize};

use crate::ast::{Expression, Span};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateNode {
    #[serde(flatten)]
    pub kind: TemplateNodeKind,
    #[serde(flatten)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TemplateNodeKind {
    Fragment {
        children: Vec<TemplateNode>,
    },
    Text {
        data: String,
    },
    Comment {
        #[serde(default)]
        data: String,
    },
    /// `{{ expression }}`
    MustacheTag {
        expression: Expression,
    },
    ElementTag {
        name: String,
        #[serde(default)]
        attributes: Vec<Attribute>,
        #[serde(default)]
        children: Vec<TemplateNode>,
        /// `false` when the parser reached the end of the document without
        /// finding the closing tag.
        #[serde(default = "default_closed")]
        closed: bool,
    },
    /// A closing tag the parser could not pair with an opening tag.
    ClosingTag {
        name: String,
    },
    IfBlock {
        expression: Expression,
        children: Vec<TemplateNode>,
        #[serde(default)]
        else_branch: Option<Vec<TemplateNode>>,
    },
    EachBlock {
        expression: Expression,
        /// Name bound to the current element.
        item: String,
        /// Name bound to the current position (or key, for maps).
        #[serde(default)]
        index: Option<String>,
        children: Vec<TemplateNode>,
        #[serde(default)]
        else_branch: Option<Vec<TemplateNode>>,
    },
}

fn default_closed() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
    #[serde(flatten)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A bare attribute such as `<tool-call is-error>`; always `true`.
    Flag(bool),
    /// Text and interpolation parts, in source order.
    Parts(Vec<TemplateNode>),
}

impl TemplateNode {
    pub fn new(kind: TemplateNodeKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Span::new(start, end);
        self
    }

    pub fn fragment(children: Vec<TemplateNode>) -> Self {
        Self::new(TemplateNodeKind::Fragment { children })
    }

    pub fn text<S: Into<String>>(data: S) -> Self {
        Self::new(TemplateNodeKind::Text { data: data.into() })
    }

    pub fn comment<S: Into<String>>(data: S) -> Self {
        Self::new(TemplateNodeKind::Comment { data: data.into() })
    }

    pub fn mustache(expression: Expression) -> Self {
        Self::new(TemplateNodeKind::MustacheTag { expression })
    }

    pub fn element<S: Into<String>>(
        name: S,
        attributes: Vec<Attribute>,
        children: Vec<TemplateNode>,
    ) -> Self {
        Self::new(TemplateNodeKind::ElementTag {
            name: name.into(),
            attributes,
            children,
            closed: true,
        })
    }

    /// An element whose closing tag is missing.
    pub fn unclosed_element<S: Into<String>>(
        name: S,
        attributes: Vec<Attribute>,
        children: Vec<TemplateNode>,
    ) -> Self {
        Self::new(TemplateNodeKind::ElementTag {
            name: name.into(),
            attributes,
            children,
            closed: false,
        })
    }

    pub fn closing<S: Into<String>>(name: S) -> Self {
        Self::new(TemplateNodeKind::ClosingTag { name: name.into() })
    }

    pub fn if_block(
        expression: Expression,
        children: Vec<TemplateNode>,
        else_branch: Option<Vec<TemplateNode>>,
    ) -> Self {
        Self::new(TemplateNodeKind::IfBlock {
            expression,
            children,
            else_branch,
        })
    }

    pub fn each_block<S: Into<String>>(
        expression: Expression,
        item: S,
        index: Option<S>,
        children: Vec<TemplateNode>,
        else_branch: Option<Vec<TemplateNode>>,
    ) -> Self {
        Self::new(TemplateNodeKind::EachBlock {
            expression,
            item: item.into(),
            index: index.map(Into::into),
            children,
            else_branch,
        })
    }
}

impl Attribute {
    pub fn flag<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            value: AttributeValue::Flag(true),
            span: Span::default(),
        }
    }

    /// `name="value"`
    pub fn text<S: Into<String>, V: Into<String>>(name: S, value: V) -> Self {
        Self {
            name: name.into(),
            value: AttributeValue::Parts(vec![TemplateNode::text(value)]),
            span: Span::default(),
        }
    }

    /// `name={{ expression }}`
    pub fn expression<S: Into<String>>(name: S, expression: Expression) -> Self {
        Self {
            name: name.into(),
            value: AttributeValue::Parts(vec![TemplateNode::mustache(expression)]),
            span: Span::default(),
        }
    }

    pub fn parts<S: Into<String>>(name: S, parts: Vec<TemplateNode>) -> Self {
        Self {
            name: name.into(),
            value: AttributeValue::Parts(parts),
            span: Span::default(),
        }
    }
}
