//! Writes filter trees back to the wire format.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::ast::{FilterNode, ModelFilterNode, ValueFilterNode};
use crate::error::FilterError;

/// One wire token; absent and `false` fields are omitted.
#[derive(Debug, Serialize)]
struct WireToken<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    op: &'static str,
    #[serde(skip_serializing_if = "is_false")]
    not: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Vec<WireToken<'a>>>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl<'a> From<&'a ModelFilterNode> for WireToken<'a> {
    fn from(node: &'a ModelFilterNode) -> Self {
        WireToken {
            path: node.path.as_deref(),
            op: node.operator.canonical_name(),
            not: node.negative,
            value: None,
            items: Some(node.items.iter().map(WireToken::from).collect()),
        }
    }
}

impl<'a> From<&'a ValueFilterNode> for WireToken<'a> {
    fn from(node: &'a ValueFilterNode) -> Self {
        WireToken {
            path: node.path.as_deref(),
            op: node.operator.canonical_name(),
            not: node.negative,
            value: node.operand.as_deref(),
            items: None,
        }
    }
}

impl<'a> From<&'a FilterNode> for WireToken<'a> {
    fn from(node: &'a FilterNode) -> Self {
        match node {
            FilterNode::Model(model) => model.into(),
            FilterNode::Value(value) => value.into(),
        }
    }
}

impl Serialize for ModelFilterNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireToken::from(self).serialize(serializer)
    }
}

impl Serialize for FilterNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireToken::from(self).serialize(serializer)
    }
}

/// Renders a filter tree as wire JSON text.
pub fn to_json(node: &ModelFilterNode) -> Result<String, FilterError> {
    serde_json::to_string(node).map_err(FilterError::Serialization)
}

pub fn to_value(node: &ModelFilterNode) -> Result<Value, FilterError> {
    serde_json::to_value(node).map_err(FilterError::Serialization)
}
