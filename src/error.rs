//! Error types of the filter engine.

use thiserror::Error;

use crate::token::ValueOperator;

/// Structural problems in a wire payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown filter field `{0}`")]
    UnknownField(String),
    #[error("field `{field}` must be {expected}")]
    InvalidFieldType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    #[error("filter item has neither `op` nor `items`")]
    MissingOperator,
    #[error("`value` is not allowed on group operator `{0}`")]
    ValueOnGroup(String),
    #[error("`items` is not allowed on value operator `{0}`")]
    ItemsOnValue(String),
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("malformed filter payload")]
    MalformedPayload(#[source] PayloadError),

    #[error("filter payload contains no usable filter")]
    EmptyParseResult,

    #[error("entity `{entity}` has no property `{path}`")]
    MissingProperty { path: String, entity: String },

    #[error("property `{entity}.{property}` is not mapped")]
    NotMappedProperty { property: String, entity: String },

    #[error("value filter node has an empty path")]
    EmptyNodePath,

    #[error("invalid operand for property `{entity}.{property}`")]
    InvalidOperand { property: String, entity: String },

    #[error("operator `{operator}` is not applicable to property `{entity}.{property}`")]
    InvalidOperator {
        operator: ValueOperator,
        property: String,
        entity: String,
    },

    #[error("unexpected type `{0}`")]
    UnexpectedType(String),

    #[error("filter root carries path `{0}`")]
    UnexpectedRootPath(String),

    #[error("filter serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("filter validation failed")]
    Validation(#[source] Box<FilterError>),

    #[error("filter compilation failed")]
    Compilation(#[source] Box<FilterError>),

    #[error("filter concatenation failed")]
    Concatenation(#[source] Box<FilterError>),
}

impl From<PayloadError> for FilterError {
    fn from(err: PayloadError) -> Self {
        FilterError::MalformedPayload(err)
    }
}

impl FilterError {
    pub(crate) fn validation(cause: FilterError) -> Self {
        FilterError::Validation(Box::new(cause))
    }

    pub(crate) fn compilation(cause: FilterError) -> Self {
        FilterError::Compilation(Box::new(cause))
    }

    pub(crate) fn concatenation(cause: FilterError) -> Self {
        FilterError::Concatenation(Box::new(cause))
    }

    pub(crate) fn missing_property(path: &str, entity: &str) -> Self {
        FilterError::MissingProperty {
            path: path.to_string(),
            entity: entity.to_string(),
        }
    }

    pub(crate) fn invalid_operand(property: &str, entity: &str) -> Self {
        FilterError::InvalidOperand {
            property: property.to_string(),
            entity: entity.to_string(),
        }
    }

    /// Innermost engine error beneath any operation-level wrappers.
    pub fn root_cause(&self) -> &FilterError {
        match self {
            FilterError::Validation(inner)
            | FilterError::Compilation(inner)
            | FilterError::Concatenation(inner) => inner.root_cause(),
            other => other,
        }
    }
}
