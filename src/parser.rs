//! Filter的JSON语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 空文本 / null / 标量 → EmptyParseResult
//!   ├─ 数组 → 隐式根节点 And, 每个元素 → parse_item()
//!   └─ 对象 → classify()
//!        ├─ 分组运算符 (And / Or) → parse_model_token()
//!        │     └─ items[] → parse_item() (递归)
//!        └─ 值运算符 (Eq / Like / ...) → 包装进隐式根节点 And
//!
//! parse_item()
//!   └─ classify()
//!        ├─ 分组运算符, 或没有 op 但有 items → parse_model_token()
//!        ├─ 值运算符 → parse_value_token()
//!        └─ 其他 → MissingOperator / UnknownOperator
//! ```
//!
//! ## 字段
//!
//! | 字段 | 类型 | 说明 |
//! |---|---|---|
//! | `path` | string | 属性名, 可以用 `.` 连接关联属性 |
//! | `op` | string | 运算符, 大小写不敏感, 支持符号别名 |
//! | `not` | bool | 取反 |
//! | `value` | string | 比较值, 只用于二元值运算符 |
//! | `items` | array | 子节点, 只用于分组运算符 |
//!
//! 字段名大小写不敏感。未知字段、类型错误和无法识别的运算符都会返回
//! `FilterError::MalformedPayload`。
//!
//! ## 解析示例
//!
//! ```text
//! {"op": "or", "items": [
//!     {"path": "Name", "op": "like", "value": "Alpha%"},
//!     {"path": "Owner", "op": "?", "not": true}
//! ]}
//! ```

use serde_json::{Map, Value};

use crate::ast::{normalize_path, ModelFilterNode, ValueFilterNode};
use crate::error::{FilterError, PayloadError};
use crate::token::{ModelOperator, Operator, ValueOperator};

pub struct Parser<'a> {
    input: &'a str,
}

/// Operator kind of one token, decided before its fields are read.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Model(ModelOperator),
    Value(ValueOperator),
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }

    pub fn parse(&self) -> Result<ModelFilterNode, FilterError> {
        if self.input.trim().is_empty() {
            return Err(FilterError::EmptyParseResult);
        }
        let value: Value = serde_json::from_str(self.input).map_err(PayloadError::from)?;
        let root = parse_value(&value)?;
        tracing::debug!(items = root.items.len(), operator = %root.operator, "parsed filter");
        Ok(root)
    }
}

/// Parses wire text into a filter tree rooted at a group node.
pub fn parse(input: &str) -> Result<ModelFilterNode, FilterError> {
    Parser::new(input).parse()
}

/// Parses an already decoded JSON document.
pub fn parse_value(value: &Value) -> Result<ModelFilterNode, FilterError> {
    match value {
        Value::Array(items) => {
            let mut root = ModelFilterNode::and();
            for item in items {
                parse_item(item, &mut root)?;
            }
            Ok(root)
        }
        Value::Object(map) => match classify(map, true)? {
            TokenKind::Model(op) => Ok(parse_model_token(map, op)?),
            TokenKind::Value(op) => {
                let value = parse_value_token(map, op)?;
                Ok(ModelFilterNode::and().with_item(value))
            }
        },
        _ => Err(FilterError::EmptyParseResult),
    }
}

fn parse_item(item: &Value, parent: &mut ModelFilterNode) -> Result<(), PayloadError> {
    let map = item.as_object().ok_or(PayloadError::InvalidFieldType {
        field: "items",
        expected: "an array of objects",
    })?;
    match classify(map, false)? {
        TokenKind::Model(op) => parent.add_item(parse_model_token(map, op)?),
        TokenKind::Value(op) => parent.add_item(parse_value_token(map, op)?),
    }
    Ok(())
}

/// Resolves the `op` field. Groups may omit it: the root always, nested
/// tokens when they carry `items`.
fn classify(map: &Map<String, Value>, is_root: bool) -> Result<TokenKind, PayloadError> {
    match field(map, "op") {
        Some(value) => {
            let token = value.as_str().ok_or(PayloadError::InvalidFieldType {
                field: "op",
                expected: "a string",
            })?;
            match Operator::from_token(token) {
                Some(Operator::Model(op)) => Ok(TokenKind::Model(op)),
                Some(Operator::Value(op)) => Ok(TokenKind::Value(op)),
                None => Err(PayloadError::UnknownOperator(token.to_string())),
            }
        }
        None if is_root || field(map, "items").is_some() => Ok(TokenKind::Model(ModelOperator::And)),
        None => Err(PayloadError::MissingOperator),
    }
}

fn parse_model_token(
    map: &Map<String, Value>,
    operator: ModelOperator,
) -> Result<ModelFilterNode, PayloadError> {
    let mut node = ModelFilterNode::new(operator);

    for (key, value) in map {
        match key.to_ascii_lowercase().as_str() {
            "op" => {} // 已在 classify() 中处理
            "path" => node.path = read_path(value)?,
            "not" => node.negative = read_bool(value)?,
            "items" => {
                let items = value.as_array().ok_or(PayloadError::InvalidFieldType {
                    field: "items",
                    expected: "an array of objects",
                })?;
                for item in items {
                    parse_item(item, &mut node)?;
                }
            }
            "value" => {
                return Err(PayloadError::ValueOnGroup(operator.canonical_name().to_string()))
            }
            _ => return Err(PayloadError::UnknownField(key.clone())),
        }
    }

    Ok(node)
}

fn parse_value_token(
    map: &Map<String, Value>,
    operator: ValueOperator,
) -> Result<ValueFilterNode, PayloadError> {
    let mut node = ValueFilterNode {
        path: None,
        negative: false,
        operator,
        operand: None,
    };

    for (key, value) in map {
        match key.to_ascii_lowercase().as_str() {
            "op" => {}
            "path" => node.path = read_path(value)?,
            "not" => node.negative = read_bool(value)?,
            "value" => node.operand = read_operand(value)?,
            "items" => {
                return Err(PayloadError::ItemsOnValue(operator.canonical_name().to_string()))
            }
            _ => return Err(PayloadError::UnknownField(key.clone())),
        }
    }

    Ok(node)
}

/// Case-insensitive field lookup.
fn field<'m>(map: &'m Map<String, Value>, name: &str) -> Option<&'m Value> {
    map.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn read_path(value: &Value) -> Result<Option<String>, PayloadError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(normalize_path(s.clone())),
        _ => Err(PayloadError::InvalidFieldType {
            field: "path",
            expected: "a string",
        }),
    }
}

fn read_bool(value: &Value) -> Result<bool, PayloadError> {
    let invalid = PayloadError::InvalidFieldType {
        field: "not",
        expected: "a boolean",
    };
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(invalid),
    }
}

/// Operands are carried as text; numbers and booleans are stringified.
fn read_operand(value: &Value) -> Result<Option<String>, PayloadError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err(PayloadError::InvalidFieldType {
            field: "value",
            expected: "a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FilterNode;

    fn payload_error(input: &str) -> PayloadError {
        match parse(input) {
            Err(FilterError::MalformedPayload(cause)) => cause,
            other => panic!("Expected malformed payload error, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_filter() {
        let input = r#"{"op": "and", "items": [{"path": "Name", "op": "=", "value": "Alpha"}]}"#;
        let root = parse(input).unwrap();

        assert_eq!(root.operator, ModelOperator::And);
        assert_eq!(root.items.len(), 1);
        match &root.items[0] {
            FilterNode::Value(node) => {
                assert_eq!(node.path.as_deref(), Some("Name"));
                assert_eq!(node.operator, ValueOperator::Eq);
                assert_eq!(node.operand.as_deref(), Some("Alpha"));
                assert!(!node.negative);
            }
            other => panic!("Expected value node, got {:?}", other),
        }
    }

    #[test]
    fn test_root_operator_defaults_to_and() {
        let root = parse(r#"{"items": []}"#).unwrap();
        assert_eq!(root.operator, ModelOperator::And);
        assert!(root.is_empty());

        let root = parse("{}").unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn test_top_level_array_is_implicit_and() {
        let input = r#"[
            {"path": "Priority", "op": ">", "value": 2},
            {"path": "Owner", "op": "exists", "not": true}
        ]"#;
        let root = parse(input).unwrap();

        assert_eq!(root.operator, ModelOperator::And);
        assert_eq!(root.items.len(), 2);
        match &root.items[0] {
            FilterNode::Value(node) => assert_eq!(node.operand.as_deref(), Some("2")),
            other => panic!("Expected value node, got {:?}", other),
        }
        match &root.items[1] {
            FilterNode::Value(node) => {
                assert_eq!(node.operator, ValueOperator::Exists);
                assert!(node.negative);
                assert_eq!(node.operand, None);
            }
            other => panic!("Expected value node, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_groups_and_relation_scope() {
        let input = r#"{"op": "OR", "not": "true", "items": [
            {"op": "And", "items": [{"path": "Name", "op": "~", "value": "%eta"}]},
            {"path": "Owner", "op": "&&", "items": [{"path": "Name", "op": "Eq", "value": "Ann"}]},
            {"items": [{"path": "Done", "op": "=", "value": "false"}]}
        ]}"#;
        let root = parse(input).unwrap();

        assert_eq!(root.operator, ModelOperator::Or);
        assert!(root.negative);
        assert_eq!(root.items.len(), 3);
        match &root.items[1] {
            FilterNode::Model(node) => {
                assert_eq!(node.path.as_deref(), Some("Owner"));
                assert_eq!(node.operator, ModelOperator::And);
                assert_eq!(node.items.len(), 1);
            }
            other => panic!("Expected model node, got {:?}", other),
        }
        assert!(matches!(&root.items[2], FilterNode::Model(node) if node.items.len() == 1));
    }

    #[test]
    fn test_field_names_are_case_insensitive() {
        let root = parse(r#"[{"PATH": " Name ", "Op": "like", "VALUE": "a%", "Not": false}]"#).unwrap();
        match &root.items[0] {
            FilterNode::Value(node) => {
                assert_eq!(node.path.as_deref(), Some("Name"));
                assert_eq!(node.operator, ValueOperator::Like);
            }
            other => panic!("Expected value node, got {:?}", other),
        }
    }

    #[test]
    fn test_single_value_token_at_root() {
        let root = parse(r#"{"path": "Name", "op": "=", "value": "x"}"#).unwrap();
        assert_eq!(root.operator, ModelOperator::And);
        assert_eq!(root.items.len(), 1);
    }

    #[test]
    fn test_empty_payloads() {
        for input in ["", "   ", "null", "42", "\"and\""] {
            assert!(
                matches!(parse(input), Err(FilterError::EmptyParseResult)),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(payload_error("{\"op\": "), PayloadError::Json(_)));
    }

    #[test]
    fn test_unknown_operator() {
        let err = payload_error(r#"[{"path": "Name", "op": "!=", "value": "x"}]"#);
        assert!(matches!(err, PayloadError::UnknownOperator(ref op) if op == "!="));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            payload_error(r#"[{"path": "Name", "value": "x"}]"#),
            PayloadError::MissingOperator
        ));
        assert!(matches!(
            payload_error(r#"[{"path": "Name", "op": "=", "value": "x", "extra": 1}]"#),
            PayloadError::UnknownField(ref f) if f == "extra"
        ));
        assert!(matches!(
            payload_error(r#"[{"op": "or", "value": "x"}]"#),
            PayloadError::ValueOnGroup(_)
        ));
        assert!(matches!(
            payload_error(r#"[{"path": "Name", "op": "=", "items": []}]"#),
            PayloadError::ItemsOnValue(_)
        ));
        assert!(matches!(
            payload_error(r#"{"items": {"op": "="}}"#),
            PayloadError::InvalidFieldType { field: "items", .. }
        ));
        assert!(matches!(
            payload_error(r#"[{"path": 5, "op": "?"}]"#),
            PayloadError::InvalidFieldType { field: "path", .. }
        ));
        assert!(matches!(
            payload_error(r#"[{"path": "Name", "op": "?", "not": "yes"}]"#),
            PayloadError::InvalidFieldType { field: "not", .. }
        ));
        assert!(matches!(
            payload_error(r#"[{"path": "Name", "op": "=", "value": ["a"]}]"#),
            PayloadError::InvalidFieldType { field: "value", .. }
        ));
        assert!(matches!(
            payload_error(r#"[1, 2]"#),
            PayloadError::InvalidFieldType { field: "items", .. }
        ));
    }
}
