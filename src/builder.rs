//! Typed construction of filter trees, and concatenation of existing ones.
//!
//! Builders are parameterized by the entity they filter and only accept
//! [`Field`] descriptors declared on that entity, so comparing a task by a
//! user property, or ordering a text field, does not compile:
//!
//! ```ignore
//! let filter = FilterBuilder::<Task>::and()
//!     .like(Task::NAME, "fix", MatchMode::Anywhere)
//!     .ge(Task::PRIORITY, &2)
//!     .related(Task::OWNER, |owner| owner.eq(User::NAME, "ann"))
//!     .build();
//! ```
//!
//! Operands are written in the invariant culture, which operand conversion
//! accepts under every configured culture.

use std::marker::PhantomData;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::ast::{FilterNode, ModelFilterNode, ValueFilterNode};
use crate::error::FilterError;
use crate::model::{Entity, Enumerated, Field, Many, Ref};
use crate::sql_compiler::MatchMode;
use crate::token::{ModelOperator, ValueOperator};

/// Field value types usable with `eq`.
pub trait Equatable {
    type Operand: ?Sized;

    fn format(value: &Self::Operand) -> String;
}

/// Field value types usable with `gt`/`lt`/`ge`/`le`.
pub trait Ordered: Equatable {}

/// Field value types usable with `like`.
pub trait Textual: Equatable<Operand = str> {}

/// Reference and collection fields.
pub trait Relation {
    type Target: Entity;
}

impl Equatable for String {
    type Operand = str;

    fn format(value: &str) -> String {
        value.to_string()
    }
}

impl Textual for String {}

impl Equatable for i64 {
    type Operand = i64;

    fn format(value: &i64) -> String {
        value.to_string()
    }
}

impl Ordered for i64 {}

impl Equatable for f64 {
    type Operand = f64;

    fn format(value: &f64) -> String {
        value.to_string()
    }
}

impl Ordered for f64 {}

impl Equatable for bool {
    type Operand = bool;

    fn format(value: &bool) -> String {
        value.to_string()
    }
}

impl Equatable for DateTime<Utc> {
    type Operand = DateTime<Utc>;

    fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl Ordered for DateTime<Utc> {}

impl Equatable for Uuid {
    type Operand = Uuid;

    fn format(value: &Uuid) -> String {
        value.hyphenated().to_string()
    }
}

impl Ordered for Uuid {}

impl Equatable for Enumerated {
    type Operand = str;

    fn format(value: &str) -> String {
        value.to_string()
    }
}

impl<E: Entity> Relation for Ref<E> {
    type Target = E;
}

impl<E: Entity> Relation for Many<E> {
    type Target = E;
}

/// Fluent builder of a filter over entity `E`.
#[derive(Debug, Clone)]
pub struct FilterBuilder<E> {
    node: ModelFilterNode,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> FilterBuilder<E> {
    pub fn new(operator: ModelOperator) -> Self {
        Self {
            node: ModelFilterNode::new(operator),
            _entity: PhantomData,
        }
    }

    pub fn and() -> Self {
        Self::new(ModelOperator::And)
    }

    pub fn or() -> Self {
        Self::new(ModelOperator::Or)
    }

    /// Name of the filtered entity.
    pub fn entity(&self) -> &'static str {
        E::ENTITY
    }

    fn compare<T>(self, field: Field<E, T>, operator: ValueOperator, operand: String) -> Self {
        self.push(ValueFilterNode::binary(field.name(), operator, operand))
    }

    pub fn eq<T: Equatable>(self, field: Field<E, T>, value: &T::Operand) -> Self {
        let operand = T::format(value);
        self.compare(field, ValueOperator::Eq, operand)
    }

    /// Like comparison; `mode` adds `%` markers around `text`.
    ///
    /// `text` is not escaped: the compiler treats every `%` in it as a match
    /// marker and strips it, so `like(f, "50%", Exact)` matches values
    /// starting with `50`. Other SQL wildcards (`_`) stay literal.
    pub fn like<T: Textual>(self, field: Field<E, T>, text: &str, mode: MatchMode) -> Self {
        let operand = match mode {
            MatchMode::Exact => text.to_string(),
            MatchMode::Start => format!("{text}%"),
            MatchMode::End => format!("%{text}"),
            MatchMode::Anywhere => format!("%{text}%"),
        };
        self.compare(field, ValueOperator::Like, operand)
    }

    pub fn gt<T: Ordered>(self, field: Field<E, T>, value: &T::Operand) -> Self {
        let operand = T::format(value);
        self.compare(field, ValueOperator::Gt, operand)
    }

    pub fn lt<T: Ordered>(self, field: Field<E, T>, value: &T::Operand) -> Self {
        let operand = T::format(value);
        self.compare(field, ValueOperator::Lt, operand)
    }

    pub fn ge<T: Ordered>(self, field: Field<E, T>, value: &T::Operand) -> Self {
        let operand = T::format(value);
        self.compare(field, ValueOperator::Ge, operand)
    }

    pub fn le<T: Ordered>(self, field: Field<E, T>, value: &T::Operand) -> Self {
        let operand = T::format(value);
        self.compare(field, ValueOperator::Le, operand)
    }

    pub fn exists<T>(self, field: Field<E, T>) -> Self {
        self.push(ValueFilterNode::exists(field.name()))
    }

    pub fn not_exists<T>(self, field: Field<E, T>) -> Self {
        self.push(ValueFilterNode::exists(field.name()).negated())
    }

    /// Compares a reference, or any collection element, by identifier.
    pub fn eq_ref<T: Relation>(self, field: Field<E, T>, id: impl ToString) -> Self {
        self.compare(field, ValueOperator::Eq, id.to_string())
    }

    pub fn group_and(self, build: impl FnOnce(Self) -> Self) -> Self {
        let group = build(Self::and()).build();
        self.push(group)
    }

    pub fn group_or(self, build: impl FnOnce(Self) -> Self) -> Self {
        let group = build(Self::or()).build();
        self.push(group)
    }

    /// Adds a negated `And` group.
    pub fn not(self, build: impl FnOnce(Self) -> Self) -> Self {
        let group = build(Self::and()).build().negated();
        self.push(group)
    }

    /// Adds a group scoped to a reference, built against the target entity.
    pub fn related<T: Entity>(
        self,
        field: Field<E, Ref<T>>,
        build: impl FnOnce(FilterBuilder<T>) -> FilterBuilder<T>,
    ) -> Self {
        let group = build(FilterBuilder::<T>::and()).build().with_path(field.name());
        self.push(group)
    }

    /// Adds a group scoped to a collection, built against the element entity.
    pub fn related_many<T: Entity>(
        self,
        field: Field<E, Many<T>>,
        build: impl FnOnce(FilterBuilder<T>) -> FilterBuilder<T>,
    ) -> Self {
        let group = build(FilterBuilder::<T>::and()).build().with_path(field.name());
        self.push(group)
    }

    /// Negates the group being built.
    pub fn negate(mut self) -> Self {
        self.node.negative = !self.node.negative;
        self
    }

    pub fn push(mut self, node: impl Into<FilterNode>) -> Self {
        self.node.add_item(node);
        self
    }

    pub fn build(self) -> ModelFilterNode {
        self.node
    }
}

/// Combines filter trees under a new root with `operator`. Every source is
/// deep-copied, in input order.
///
/// A root `path` would turn into a relation scope once nested, so sources
/// carrying one are rejected.
pub fn concat<'a, I>(trees: I, operator: ModelOperator) -> Result<ModelFilterNode, FilterError>
where
    I: IntoIterator<Item = &'a ModelFilterNode>,
{
    let mut root = ModelFilterNode::new(operator);
    for tree in trees {
        if let Some(path) = &tree.path {
            return Err(FilterError::concatenation(FilterError::UnexpectedRootPath(path.clone())));
        }
        root.add_item(tree.clone());
    }
    tracing::debug!(operator = %operator, items = root.items.len(), "concatenated filters");
    Ok(root)
}
