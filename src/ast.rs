//! Filter node tree: logical groups and value comparisons.

use crate::token::{ModelOperator, ValueOperator};

/// A node of the predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// Logical group, optionally scoped to a relation.
    Model(ModelFilterNode),
    /// Single comparison against one property.
    Value(ValueFilterNode),
}

impl FilterNode {
    pub fn path(&self) -> Option<&str> {
        match self {
            FilterNode::Model(node) => node.path.as_deref(),
            FilterNode::Value(node) => node.path.as_deref(),
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            FilterNode::Model(node) => node.negative,
            FilterNode::Value(node) => node.negative,
        }
    }
}

impl From<ModelFilterNode> for FilterNode {
    fn from(node: ModelFilterNode) -> Self {
        FilterNode::Model(node)
    }
}

impl From<ValueFilterNode> for FilterNode {
    fn from(node: ValueFilterNode) -> Self {
        FilterNode::Value(node)
    }
}

/// `AND`/`OR` group of child nodes.
///
/// When `path` names a reference or collection property the group is a
/// traversal scope: its children are resolved against the related entity.
/// `Clone` copies the whole subtree, so a cloned group never shares children
/// with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFilterNode {
    pub path: Option<String>,
    pub negative: bool,
    pub operator: ModelOperator,
    pub items: Vec<FilterNode>,
}

impl Default for ModelFilterNode {
    fn default() -> Self {
        Self::new(ModelOperator::And)
    }
}

impl ModelFilterNode {
    pub fn new(operator: ModelOperator) -> Self {
        Self {
            path: None,
            negative: false,
            operator,
            items: Vec::new(),
        }
    }

    pub fn and() -> Self {
        Self::new(ModelOperator::And)
    }

    pub fn or() -> Self {
        Self::new(ModelOperator::Or)
    }

    /// Scopes the group to a relation property.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = normalize_path(path.into());
        self
    }

    pub fn negated(mut self) -> Self {
        self.negative = !self.negative;
        self
    }

    pub fn with_item(mut self, item: impl Into<FilterNode>) -> Self {
        self.items.push(item.into());
        self
    }

    pub fn add_item(&mut self, item: impl Into<FilterNode>) {
        self.items.push(item.into());
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Leaf comparison `path <operator> operand`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFilterNode {
    pub path: Option<String>,
    pub negative: bool,
    pub operator: ValueOperator,
    /// Raw operand text; `None` for `Exists`.
    pub operand: Option<String>,
}

impl ValueFilterNode {
    pub fn new(path: impl Into<String>, operator: ValueOperator, operand: Option<String>) -> Self {
        Self {
            path: normalize_path(path.into()),
            negative: false,
            operator,
            operand,
        }
    }

    pub fn binary(path: impl Into<String>, operator: ValueOperator, operand: impl Into<String>) -> Self {
        Self::new(path, operator, Some(operand.into()))
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Self::new(path, ValueOperator::Exists, None)
    }

    pub fn negated(mut self) -> Self {
        self.negative = !self.negative;
        self
    }

    pub fn is_unary(&self) -> bool {
        self.operator == ValueOperator::Exists
    }

    pub fn is_binary(&self) -> bool {
        !self.is_unary()
    }
}

/// Trims a path and maps blank paths to `None`.
pub(crate) fn normalize_path(path: String) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == path.len() {
        Some(path)
    } else {
        Some(trimmed.to_string())
    }
}
