//! Checks a filter tree against the entity model.
//!
//! Validation walks the tree depth-first and stops at the first problem.
//! Whatever goes wrong is reported once, wrapped in
//! [`FilterError::Validation`], with the original cause as its source.

use crate::ast::{FilterNode, ModelFilterNode, ValueFilterNode};
use crate::error::FilterError;
use crate::model::{EntityDescriptor, ModelMetadata, PropertyDescriptor, PropertyKind};
use crate::token::ValueOperator;
use crate::value::{convert_operand, Culture, FilterValue, TimeZoneSetting};

/// Final property of a path resolved hop by hop from some entity.
#[derive(Debug)]
pub(crate) struct ResolvedPath<'m> {
    /// Entity declaring the final property.
    pub owner: &'m EntityDescriptor,
    pub property: &'m PropertyDescriptor,
}

pub(crate) fn lookup_entity<'m, M: ModelMetadata + ?Sized>(
    metadata: &'m M,
    name: &str,
) -> Result<&'m EntityDescriptor, FilterError> {
    metadata
        .entity(name)
        .ok_or_else(|| FilterError::UnexpectedType(name.to_string()))
}

/// Resolves a possibly dotted path (`Owner.Department.Name`). Every segment
/// but the last must be a reference or collection.
pub(crate) fn resolve_path<'m, M: ModelMetadata + ?Sized>(
    metadata: &'m M,
    entity: &'m EntityDescriptor,
    path: &str,
) -> Result<ResolvedPath<'m>, FilterError> {
    let mut owner = entity;
    let mut segments = path.split('.').map(str::trim).peekable();

    while let Some(segment) = segments.next() {
        let property = owner
            .property(segment)
            .ok_or_else(|| FilterError::missing_property(segment, owner.name))?;
        if !property.mapped {
            return Err(FilterError::NotMappedProperty {
                property: property.name.to_string(),
                entity: owner.name.to_string(),
            });
        }

        if segments.peek().is_none() {
            return Ok(ResolvedPath { owner, property });
        }

        let target = property
            .kind
            .target()
            .ok_or_else(|| FilterError::UnexpectedType(format!("{}.{}", owner.name, property.name)))?;
        owner = lookup_entity(metadata, target)?;
    }

    Err(FilterError::missing_property(path, entity.name))
}

/// Scalar kind an operand of `property` converts to: the property's own kind,
/// or the identifier kind of the related entity.
pub(crate) fn comparable_kind<M: ModelMetadata + ?Sized>(
    metadata: &M,
    property: &PropertyDescriptor,
) -> Result<PropertyKind, FilterError> {
    match property.kind.target() {
        None => Ok(property.kind),
        Some(target) => {
            let target = lookup_entity(metadata, target)?;
            target
                .id_property()
                .map(|id| id.kind)
                .filter(|kind| !kind.is_relation())
                .ok_or_else(|| FilterError::UnexpectedType(format!("{}.{}", target.name, target.id)))
        }
    }
}

/// Operators a property kind accepts.
pub(crate) fn operator_allowed(kind: &PropertyKind, operator: ValueOperator) -> bool {
    match kind {
        PropertyKind::Text => matches!(
            operator,
            ValueOperator::Eq | ValueOperator::Like | ValueOperator::Exists
        ),
        PropertyKind::Value(_) => operator != ValueOperator::Like,
        PropertyKind::Reference { .. } | PropertyKind::Collection { .. } => {
            matches!(operator, ValueOperator::Eq | ValueOperator::Exists)
        }
    }
}

pub struct Validator<'a, M: ?Sized> {
    metadata: &'a M,
    culture: Culture,
    zone: TimeZoneSetting,
}

impl<'a, M: ModelMetadata + ?Sized> Validator<'a, M> {
    pub fn new(metadata: &'a M, culture: Culture, zone: TimeZoneSetting) -> Self {
        Self {
            metadata,
            culture,
            zone,
        }
    }

    /// Validates `node` as a filter over `entity`.
    pub fn validate(&self, node: &ModelFilterNode, entity: &str) -> Result<(), FilterError> {
        self.validate_model(node, entity).map_err(|cause| {
            tracing::debug!(entity, error = %cause, "filter validation failed");
            FilterError::validation(cause)
        })
    }

    fn validate_model(&self, node: &ModelFilterNode, entity: &str) -> Result<(), FilterError> {
        let descriptor = lookup_entity(self.metadata, entity)?;

        for item in &node.items {
            let resolved = match item.path() {
                Some(path) => Some(resolve_path(self.metadata, descriptor, path)?),
                None => None,
            };

            match item {
                FilterNode::Model(child) => {
                    let inner = match &resolved {
                        Some(resolved) => resolved.property.kind.target().ok_or_else(|| {
                            FilterError::UnexpectedType(format!(
                                "{}.{}",
                                resolved.owner.name, resolved.property.name
                            ))
                        })?,
                        None => descriptor.name,
                    };
                    self.validate_model(child, inner)?;
                }
                FilterNode::Value(child) => {
                    let resolved = resolved.ok_or(FilterError::EmptyNodePath)?;
                    self.validate_value(child, &resolved)?;
                }
            }
        }

        Ok(())
    }

    fn validate_value(&self, node: &ValueFilterNode, resolved: &ResolvedPath<'_>) -> Result<(), FilterError> {
        let property = resolved.property;
        let entity = resolved.owner.name;

        if !operator_allowed(&property.kind, node.operator) {
            return Err(FilterError::InvalidOperator {
                operator: node.operator,
                property: property.name.to_string(),
                entity: entity.to_string(),
            });
        }

        let operand = node.operand.as_deref().filter(|raw| !raw.trim().is_empty());
        match (node.is_binary(), operand) {
            (true, Some(raw)) => {
                self.convert(property, raw)
                    .ok_or_else(|| FilterError::invalid_operand(property.name, entity))?;
                Ok(())
            }
            (false, None) => Ok(()),
            _ => Err(FilterError::invalid_operand(property.name, entity)),
        }
    }

    /// Converts an operand for comparison against `property`.
    pub(crate) fn convert(&self, property: &PropertyDescriptor, raw: &str) -> Option<FilterValue> {
        let kind = comparable_kind(self.metadata, property).ok()?;
        convert_operand(raw, &kind, &self.culture, &self.zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;
    use crate::parser::parse;

    fn validate(input: &str, entity: &str) -> Result<(), FilterError> {
        let registry = demo::registry();
        let validator = Validator::new(&registry, Culture::INVARIANT, TimeZoneSetting::utc());
        validator.validate(&parse(input).unwrap(), entity)
    }

    fn root_cause(input: &str, entity: &str) -> FilterError {
        match validate(input, entity) {
            Err(FilterError::Validation(cause)) => *cause,
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_well_typed_filter_passes() {
        let input = r#"{"op": "and", "items": [
            {"path": "Name", "op": "like", "value": "%fix%"},
            {"path": "Priority", "op": ">=", "value": "1"},
            {"path": "Estimate", "op": "<", "value": "2.5"},
            {"path": "Done", "op": "=", "value": "false"},
            {"path": "DueDate", "op": "=", "value": "2020-03-15"},
            {"path": "Status", "op": "=", "value": "open"},
            {"path": "Owner", "op": "=", "value": "7"},
            {"path": "Owner", "op": "exists", "not": true},
            {"path": "Tags", "op": "exists"},
            {"path": "Owner.Department.Name", "op": "=", "value": "R&D"},
            {"path": "Tags", "op": "or", "items": [{"path": "Name", "op": "=", "value": "bug"}]},
            {"op": "or", "items": []}
        ]}"#;
        validate(input, "Task").unwrap();
    }

    #[test]
    fn test_missing_property_names_path_and_entity() {
        match root_cause(r#"[{"path": "Titel", "op": "=", "value": "x"}]"#, "Task") {
            FilterError::MissingProperty { path, entity } => {
                assert_eq!(path, "Titel");
                assert_eq!(entity, "Task");
            }
            other => panic!("Expected missing property, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_property_in_relation_scope() {
        let input = r#"[{"path": "Owner", "op": "and", "items": [{"path": "Priority", "op": "=", "value": "1"}]}]"#;
        assert!(matches!(
            root_cause(input, "Task"),
            FilterError::MissingProperty { ref entity, .. } if entity == "User"
        ));
    }

    #[test]
    fn test_not_mapped_property() {
        assert!(matches!(
            root_cause(r#"[{"path": "Summary", "op": "like", "value": "x%"}]"#, "Task"),
            FilterError::NotMappedProperty { ref property, .. } if property == "Summary"
        ));
    }

    #[test]
    fn test_empty_value_path() {
        assert!(matches!(
            root_cause(r#"[{"op": "=", "value": "x"}]"#, "Task"),
            FilterError::EmptyNodePath
        ));
    }

    #[test]
    fn test_operator_by_type() {
        assert!(matches!(
            root_cause(r#"[{"path": "Name", "op": ">", "value": "a"}]"#, "Task"),
            FilterError::InvalidOperator { operator: ValueOperator::Gt, .. }
        ));
        assert!(matches!(
            root_cause(r#"[{"path": "Priority", "op": "like", "value": "1"}]"#, "Task"),
            FilterError::InvalidOperator { operator: ValueOperator::Like, .. }
        ));
        assert!(matches!(
            root_cause(r#"[{"path": "Owner", "op": "<", "value": "1"}]"#, "Task"),
            FilterError::InvalidOperator { operator: ValueOperator::Lt, .. }
        ));
        assert!(matches!(
            root_cause(r#"[{"path": "Tags", "op": "like", "value": "1"}]"#, "Task"),
            FilterError::InvalidOperator { .. }
        ));
    }

    #[test]
    fn test_operand_shape() {
        assert!(matches!(
            root_cause(r#"[{"path": "Name", "op": "="}]"#, "Task"),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            root_cause(r#"[{"path": "Name", "op": "=", "value": "  "}]"#, "Task"),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            root_cause(r#"[{"path": "Owner", "op": "?", "value": "1"}]"#, "Task"),
            FilterError::InvalidOperand { .. }
        ));
    }

    #[test]
    fn test_operand_conversion() {
        for input in [
            r#"[{"path": "Priority", "op": "=", "value": "high"}]"#,
            r#"[{"path": "DueDate", "op": "=", "value": "soon"}]"#,
            r#"[{"path": "Status", "op": "=", "value": "Archived"}]"#,
            r#"[{"path": "Owner", "op": "=", "value": "ann"}]"#,
            r#"[{"path": "Done", "op": "=", "value": "yes"}]"#,
        ] {
            assert!(
                matches!(root_cause(input, "Task"), FilterError::InvalidOperand { .. }),
                "input {}",
                input
            );
        }
    }

    #[test]
    fn test_unexpected_types() {
        // relation scope on a scalar property
        assert!(matches!(
            root_cause(r#"[{"path": "Name", "op": "and", "items": []}]"#, "Task"),
            FilterError::UnexpectedType(_)
        ));
        // dotted path through a scalar
        assert!(matches!(
            root_cause(r#"[{"path": "Name.Length", "op": "=", "value": "1"}]"#, "Task"),
            FilterError::UnexpectedType(_)
        ));
        assert!(matches!(root_cause("[]", "Invoice"), FilterError::UnexpectedType(ref t) if t == "Invoice"));
    }

    #[test]
    fn test_guid_identifiers() {
        validate(
            r#"[
                {"path": "Id", "op": ">", "value": "67e55044-10b1-426f-9247-bb680e5fe0c8"},
                {"path": "Parent", "op": "=", "value": "{67E55044-10B1-426F-9247-BB680E5FE0C8}"},
                {"path": "Parent.Task.Name", "op": "=", "value": "Alpha"},
                {"path": "Task", "op": "=", "value": "1"}
            ]"#,
            "Attachment",
        )
        .unwrap();

        assert!(matches!(
            root_cause(r#"[{"path": "Parent", "op": "=", "value": "not-a-guid"}]"#, "Attachment"),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            root_cause(r#"[{"path": "Id", "op": "=", "value": "42"}]"#, "Attachment"),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            root_cause(r#"[{"path": "Id", "op": "like", "value": "%abc%"}]"#, "Attachment"),
            FilterError::InvalidOperator { operator: ValueOperator::Like, .. }
        ));
    }

    #[test]
    fn test_ru_culture_operands() {
        let registry = demo::registry();
        let validator = Validator::new(&registry, Culture::RU_RU, TimeZoneSetting::utc());
        let ok = parse(r#"[
            {"path": "Estimate", "op": "=", "value": "2,5"},
            {"path": "DueDate", "op": "=", "value": "15.03.2020"}
        ]"#)
        .unwrap();
        validator.validate(&ok, "Task").unwrap();

        let us_date = parse(r#"[{"path": "DueDate", "op": "=", "value": "03/15/2020"}]"#).unwrap();
        assert!(validator.validate(&us_date, "Task").is_err());
    }
}
