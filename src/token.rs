//! Operator tokens of the filter wire format.
//!
//! Model and value operators live in one table, so a token always resolves
//! to exactly one operator kind and the parser never has to guess whether a
//! token opens a group or a comparison.

use std::fmt;

/// Logical operator of a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelOperator {
    And,
    Or,
}

/// Comparison operator of a value node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueOperator {
    Eq,     // =
    Like,   // like, ~
    Gt,     // >
    Lt,     // <
    Ge,     // >=
    Le,     // <=
    Exists, // exists, ?
}

/// Any operator that can appear in an `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Model(ModelOperator),
    Value(ValueOperator),
}

/// Every accepted spelling, canonical names first.
static OPERATOR_TOKENS: &[(&str, Operator)] = &[
    ("And", Operator::Model(ModelOperator::And)),
    ("Or", Operator::Model(ModelOperator::Or)),
    ("Eq", Operator::Value(ValueOperator::Eq)),
    ("Like", Operator::Value(ValueOperator::Like)),
    ("Gt", Operator::Value(ValueOperator::Gt)),
    ("Lt", Operator::Value(ValueOperator::Lt)),
    ("Ge", Operator::Value(ValueOperator::Ge)),
    ("Le", Operator::Value(ValueOperator::Le)),
    ("Exists", Operator::Value(ValueOperator::Exists)),
    ("&&", Operator::Model(ModelOperator::And)),
    ("||", Operator::Model(ModelOperator::Or)),
    ("=", Operator::Value(ValueOperator::Eq)),
    ("~", Operator::Value(ValueOperator::Like)),
    (">", Operator::Value(ValueOperator::Gt)),
    ("<", Operator::Value(ValueOperator::Lt)),
    (">=", Operator::Value(ValueOperator::Ge)),
    ("<=", Operator::Value(ValueOperator::Le)),
    ("?", Operator::Value(ValueOperator::Exists)),
];

impl Operator {
    /// Resolves a wire token, ignoring case and surrounding whitespace.
    pub fn from_token(token: &str) -> Option<Operator> {
        let token = token.trim();
        OPERATOR_TOKENS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, op)| *op)
    }

    pub fn all_tokens() -> impl Iterator<Item = &'static str> {
        OPERATOR_TOKENS.iter().map(|(name, _)| *name)
    }
}

impl ModelOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        match Operator::from_token(token)? {
            Operator::Model(op) => Some(op),
            Operator::Value(_) => None,
        }
    }

    /// Canonical spelling written back to the wire.
    pub fn canonical_name(self) -> &'static str {
        match self {
            ModelOperator::And => "And",
            ModelOperator::Or => "Or",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ModelOperator::And => "&&",
            ModelOperator::Or => "||",
        }
    }

    /// The dual operator, used when pushing a negation through a group.
    pub fn dual(self) -> Self {
        match self {
            ModelOperator::And => ModelOperator::Or,
            ModelOperator::Or => ModelOperator::And,
        }
    }
}

impl ValueOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        match Operator::from_token(token)? {
            Operator::Value(op) => Some(op),
            Operator::Model(_) => None,
        }
    }

    pub fn canonical_name(self) -> &'static str {
        match self {
            ValueOperator::Eq => "Eq",
            ValueOperator::Like => "Like",
            ValueOperator::Gt => "Gt",
            ValueOperator::Lt => "Lt",
            ValueOperator::Ge => "Ge",
            ValueOperator::Le => "Le",
            ValueOperator::Exists => "Exists",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ValueOperator::Eq => "=",
            ValueOperator::Like => "~",
            ValueOperator::Gt => ">",
            ValueOperator::Lt => "<",
            ValueOperator::Ge => ">=",
            ValueOperator::Le => "<=",
            ValueOperator::Exists => "?",
        }
    }
}

impl fmt::Display for ModelOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl fmt::Display for ValueOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}
