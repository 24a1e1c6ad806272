//! Entity model metadata.
//!
//! Every entity type contributes a static [`EntityDescriptor`] once, at
//! registration time. The validator and compiler look properties up by name
//! in these tables instead of inspecting types at runtime, so a typo'd or
//! unmapped path is caught the same way for every request.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Primitive (non-text, non-relation) property types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    DateTime,
    /// GUID identifier.
    Uuid,
    /// Enumeration stored by member name.
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    Text,
    Value(ValueType),
    /// Many-to-one reference; `column` is the foreign key on the owning table.
    Reference {
        target: &'static str,
        column: &'static str,
    },
    /// One-to-many collection; `column` is the foreign key on the element
    /// table pointing back at the owner.
    Collection {
        target: &'static str,
        column: &'static str,
    },
}

impl PropertyKind {
    /// Target entity of a reference or collection.
    pub fn target(&self) -> Option<&'static str> {
        match self {
            PropertyKind::Reference { target, .. } | PropertyKind::Collection { target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }

    pub fn is_relation(&self) -> bool {
        self.target().is_some()
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Text => f.write_str("text"),
            PropertyKind::Value(ValueType::Bool) => f.write_str("bool"),
            PropertyKind::Value(ValueType::Int) => f.write_str("int"),
            PropertyKind::Value(ValueType::Float) => f.write_str("float"),
            PropertyKind::Value(ValueType::DateTime) => f.write_str("datetime"),
            PropertyKind::Value(ValueType::Uuid) => f.write_str("uuid"),
            PropertyKind::Value(ValueType::Enum(_)) => f.write_str("enum"),
            PropertyKind::Reference { target, .. } => write!(f, "{}", target),
            PropertyKind::Collection { target, .. } => write!(f, "[{}]", target),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
    /// `false` for computed properties with no backing column.
    pub mapped: bool,
    /// Exact instants; date comparisons on these are never widened to a day.
    pub timestamp: bool,
}

impl PropertyDescriptor {
    pub const fn new(name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            kind,
            mapped: true,
            timestamp: false,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, PropertyKind::Text)
    }

    pub const fn value(name: &'static str, value_type: ValueType) -> Self {
        Self::new(name, PropertyKind::Value(value_type))
    }

    pub const fn reference(name: &'static str, target: &'static str, column: &'static str) -> Self {
        Self::new(name, PropertyKind::Reference { target, column })
    }

    pub const fn collection(name: &'static str, target: &'static str, column: &'static str) -> Self {
        Self::new(name, PropertyKind::Collection { target, column })
    }

    pub const fn not_mapped(mut self) -> Self {
        self.mapped = false;
        self
    }

    pub const fn timestamp(mut self) -> Self {
        self.timestamp = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub name: &'static str,
    /// Name of the identifier property.
    pub id: &'static str,
    properties: Vec<PropertyDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: &'static str, id: &'static str) -> Self {
        Self {
            name,
            id,
            properties: Vec::new(),
        }
    }

    pub fn with(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn id_property(&self) -> Option<&PropertyDescriptor> {
        self.property(self.id)
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }
}

/// Source of entity and property metadata for validation and compilation.
pub trait ModelMetadata {
    fn entity(&self, name: &str) -> Option<&EntityDescriptor>;
}

impl<M: ModelMetadata + ?Sized> ModelMetadata for &M {
    fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        (**self).entity(name)
    }
}

/// An entity type with a statically known descriptor.
pub trait Entity {
    const ENTITY: &'static str;

    fn descriptor() -> EntityDescriptor;
}

/// Registration-time table of entity descriptors.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entities: HashMap<&'static str, EntityDescriptor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: Entity>(mut self) -> Self {
        self.insert(E::descriptor());
        self
    }

    pub fn insert(&mut self, descriptor: EntityDescriptor) {
        tracing::trace!(entity = descriptor.name, "registering entity descriptor");
        self.entities.insert(descriptor.name, descriptor);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entities.keys().copied()
    }
}

impl ModelMetadata for ModelRegistry {
    fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }
}

/// Marker for a many-to-one reference field to `E`.
pub struct Ref<E>(PhantomData<fn() -> E>);

/// Marker for a one-to-many collection field of `E`.
pub struct Many<E>(PhantomData<fn() -> E>);

/// Marker for an enumeration field stored by member name.
pub struct Enumerated;

/// Typed name of a property of entity `E` with value type `T`.
///
/// Declared as associated constants next to the entity descriptor, so
/// builder calls refer to properties without string literals.
pub struct Field<E, T> {
    name: &'static str,
    _marker: PhantomData<fn() -> (E, T)>,
}

impl<E, T> Field<E, T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<E, T> Clone for Field<E, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, T> Copy for Field<E, T> {}

impl<E, T> fmt::Debug for Field<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person;

    impl Person {
        const FULL_NAME: Field<Person, String> = Field::new("Name");
    }

    impl Entity for Person {
        const ENTITY: &'static str = "Person";

        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("Person", "Id")
                .with(PropertyDescriptor::value("Id", ValueType::Int))
                .with(PropertyDescriptor::text("Name"))
                .with(PropertyDescriptor::reference("Manager", "Person", "ManagerId"))
                .with(PropertyDescriptor::text("DisplayName").not_mapped())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ModelRegistry::new().register::<Person>();
        assert_eq!(registry.len(), 1);

        let person = registry.entity("Person").unwrap();
        assert_eq!(person.id_property().unwrap().kind, PropertyKind::Value(ValueType::Int));
        assert_eq!(person.property("Manager").unwrap().kind.target(), Some("Person"));
        assert!(!person.property("DisplayName").unwrap().mapped);
        assert!(person.property("name").is_none());
        assert!(registry.entity("Unknown").is_none());
    }

    #[test]
    fn test_field_is_copy() {
        let field = Person::FULL_NAME;
        let copy = field;
        assert_eq!(field.name(), copy.name());
        assert_eq!(format!("{:?}", copy), "Field(\"Name\")");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(PropertyKind::Value(ValueType::DateTime).to_string(), "datetime");
        assert_eq!(PropertyKind::Value(ValueType::Uuid).to_string(), "uuid");
        assert_eq!(
            PropertyKind::Collection { target: "Tag", column: "TaskId" }.to_string(),
            "[Tag]"
        );
    }
}
