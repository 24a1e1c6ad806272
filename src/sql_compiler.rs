//! Compiles validated filter trees into predicates over joined aliases and
//! renders them with sea-query.

use std::collections::HashSet;

use sea_query::{
    Asterisk, Condition, Expr, Func, Iden, JoinType, LikeExpr, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr,
};

use crate::ast::{FilterNode, ModelFilterNode, ValueFilterNode};
use crate::config::TableMapping;
use crate::error::FilterError;
use crate::model::{EntityDescriptor, ModelMetadata, PropertyKind, ValueType};
use crate::token::{ModelOperator, ValueOperator};
use crate::validator::{lookup_entity, Validator};
use crate::value::{Culture, FilterValue, TimeZoneSetting};

/// Alias of the root entity in rendered SQL.
pub const ROOT_ALIAS: &str = "this";

/// Represents a table identifier for sea-query
#[derive(Debug, Clone)]
pub enum TableName {
    Root,
    Alias(String),
    Table(String),
}

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            TableName::Root => ROOT_ALIAS,
            TableName::Alias(alias) => alias,
            TableName::Table(table) => table,
        };
        let _ = s.write_str(name);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// A column of the root entity (`table == None`) or of a join alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: Option<&str>, column: &str) -> Self {
        Self {
            table: table.map(str::to_string),
            column: column.to_string(),
        }
    }

    fn table_name(&self) -> TableName {
        match &self.table {
            Some(alias) => TableName::Alias(alias.clone()),
            None => TableName::Root,
        }
    }

    fn expr(&self) -> Expr {
        Expr::col((self.table_name(), ColumnName(self.column.clone())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
}

/// How a Like literal is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Start,
    End,
    Anywhere,
}

impl MatchMode {
    /// Picks the mode from wildcard markers on either end of `raw`.
    pub fn from_markers(raw: &str, wildcard: char) -> Self {
        match (raw.starts_with(wildcard), raw.ends_with(wildcard) && raw.len() > wildcard.len_utf8()) {
            (true, true) => MatchMode::Anywhere,
            (true, false) => MatchMode::End,
            (false, true) => MatchMode::Start,
            (false, false) => MatchMode::Exact,
        }
    }

    pub fn matches(self, candidate: &str, text: &str) -> bool {
        match self {
            MatchMode::Exact => candidate == text,
            MatchMode::Start => candidate.starts_with(text),
            MatchMode::End => candidate.ends_with(text),
            MatchMode::Anywhere => candidate.contains(text),
        }
    }

    fn pattern(self, text: &str) -> String {
        let escaped = escape_like(text);
        match self {
            MatchMode::Exact => escaped,
            MatchMode::Start => format!("{escaped}%"),
            MatchMode::End => format!("%{escaped}"),
            MatchMode::Anywhere => format!("%{escaped}%"),
        }
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Compiled boolean predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: FilterValue,
    },
    Like {
        column: ColumnRef,
        text: String,
        mode: MatchMode,
    },
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
}

impl Predicate {
    fn negate_if(self, negative: bool) -> Self {
        if negative {
            Predicate::Not(Box::new(self))
        } else {
            self
        }
    }

    pub fn to_condition(&self) -> Condition {
        match self {
            Predicate::All(parts) => parts
                .iter()
                .fold(Condition::all(), |cond, part| cond.add(part.to_condition())),
            Predicate::Any(parts) => parts
                .iter()
                .fold(Condition::any(), |cond, part| cond.add(part.to_condition())),
            Predicate::Not(inner) => inner.to_condition().not(),
            Predicate::Compare { column, op, value } => {
                Condition::all().add(compare_expr(column, *op, value))
            }
            Predicate::Like { column, text, mode } => Condition::all().add(
                column
                    .expr()
                    .like(LikeExpr::new(mode.pattern(text)).escape('\\')),
            ),
            Predicate::IsNull(column) => Condition::all().add(column.expr().is_null()),
            Predicate::IsNotNull(column) => Condition::all().add(column.expr().is_not_null()),
        }
    }
}

fn compare_expr(column: &ColumnRef, op: CompareOp, value: &FilterValue) -> SimpleExpr {
    let col = column.expr();
    let val = sea_query::Value::from(value.clone());
    match op {
        CompareOp::Eq => col.eq(val),
        CompareOp::Gt => col.gt(val),
        CompareOp::Lt => col.lt(val),
        CompareOp::Ge => col.gte(val),
        CompareOp::Le => col.lte(val),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Reference,
    Collection,
}

/// One left outer join created for a relation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAlias {
    /// Dotted relation path from the root entity, e.g. `Owner.Department`.
    pub path: String,
    pub alias: String,
    /// Alias of the joined-from table; `None` for the root.
    pub parent: Option<String>,
    pub entity: &'static str,
    pub kind: JoinKind,
    /// Foreign key: on the parent for references, on the element for collections.
    pub column: &'static str,
    pub parent_id: &'static str,
    pub target_id: &'static str,
}

impl JoinAlias {
    /// Alias derived from a relation path.
    pub fn alias_for(path: &str) -> String {
        path.replace('.', "_")
    }

    fn parent_table(&self) -> TableName {
        match &self.parent {
            Some(parent) => TableName::Alias(parent.clone()),
            None => TableName::Root,
        }
    }

    fn on_condition(&self) -> SimpleExpr {
        let alias = TableName::Alias(self.alias.clone());
        match self.kind {
            JoinKind::Reference => Expr::col((alias, ColumnName(self.target_id.to_string())))
                .equals((self.parent_table(), ColumnName(self.column.to_string()))),
            JoinKind::Collection => Expr::col((alias, ColumnName(self.column.to_string())))
                .equals((self.parent_table(), ColumnName(self.parent_id.to_string()))),
        }
    }
}

/// Join aliases created during one compile call, in creation order.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    joins: Vec<JoinAlias>,
    paths: HashSet<String>,
}

impl AliasRegistry {
    fn register(&mut self, join: JoinAlias) {
        if self.paths.insert(join.path.clone()) {
            tracing::trace!(path = %join.path, alias = %join.alias, "created join alias");
            self.joins.push(join);
        }
    }

    pub fn into_joins(self) -> Vec<JoinAlias> {
        self.joins
    }
}

/// Result of compiling a filter: a predicate plus the joins it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub entity: &'static str,
    pub id_column: &'static str,
    pub joins: Vec<JoinAlias>,
    pub predicate: Predicate,
}

impl CompiledFilter {
    pub fn join(&self, path: &str) -> Option<&JoinAlias> {
        self.joins.iter().find(|join| join.path == path)
    }

    pub fn has_collection_join(&self) -> bool {
        self.joins.iter().any(|join| join.kind == JoinKind::Collection)
    }

    fn apply_joins(&self, select: &mut SelectStatement, mapping: &TableMapping) {
        select.from_as(TableName::Table(mapping.get_table_name(self.entity)), TableName::Root);
        for join in &self.joins {
            select.join_as(
                JoinType::LeftJoin,
                TableName::Table(mapping.get_table_name(join.entity)),
                TableName::Alias(join.alias.clone()),
                join.on_condition(),
            );
        }
        select.cond_where(self.predicate.to_condition());
    }

    /// `SELECT this.*` over the root table and its joins. Collection joins
    /// multiply rows, so the select is made distinct when one is present.
    pub fn select_statement(&self, mapping: &TableMapping) -> SelectStatement {
        let mut select = Query::select();
        select.column((TableName::Root, Asterisk));
        if self.has_collection_join() {
            select.distinct();
        }
        self.apply_joins(&mut select, mapping);
        select
    }

    pub fn count_statement(&self, mapping: &TableMapping) -> SelectStatement {
        let mut select = Query::select();
        select.expr(Func::count_distinct(Expr::col((
            TableName::Root,
            ColumnName(self.id_column.to_string()),
        ))));
        self.apply_joins(&mut select, mapping);
        select
    }

    pub fn to_sql(&self, mapping: &TableMapping) -> String {
        self.select_statement(mapping).to_string(PostgresQueryBuilder)
    }

    pub fn to_count_sql(&self, mapping: &TableMapping) -> String {
        self.count_statement(mapping).to_string(PostgresQueryBuilder)
    }
}

/// Entity scope the compiler is currently inside.
#[derive(Debug, Clone)]
struct Scope<'m> {
    entity: &'m EntityDescriptor,
    /// Identifier column of the root entity.
    root_id: &'m str,
    /// Relation path from the root; `None` at the root.
    path: Option<String>,
}

impl<'m> Scope<'m> {
    fn alias(&self) -> Option<String> {
        self.path.as_deref().map(JoinAlias::alias_for)
    }

    fn column(&self, column: &str) -> ColumnRef {
        ColumnRef {
            table: self.alias(),
            column: column.to_string(),
        }
    }
}

/// SQL Compiler that converts filter trees to predicates
pub struct FilterCompiler<'a, M: ?Sized> {
    metadata: &'a M,
    culture: Culture,
    zone: TimeZoneSetting,
    wildcard: char,
}

impl<'a, M: ModelMetadata + ?Sized> FilterCompiler<'a, M> {
    pub fn new(metadata: &'a M, culture: Culture, zone: TimeZoneSetting) -> Self {
        Self {
            metadata,
            culture,
            zone,
            wildcard: '%',
        }
    }

    pub fn with_wildcard(mut self, wildcard: char) -> Self {
        self.wildcard = wildcard;
        self
    }

    fn validator(&self) -> Validator<'a, M> {
        Validator::new(self.metadata, self.culture, self.zone)
    }

    /// Validates and compiles `node` as a filter over `entity`.
    pub fn compile(&self, node: &ModelFilterNode, entity: &str) -> Result<CompiledFilter, FilterError> {
        self.compile_checked(node, entity).map_err(|cause| {
            tracing::debug!(entity, error = %cause, "filter compilation failed");
            FilterError::compilation(cause)
        })
    }

    fn compile_checked(&self, node: &ModelFilterNode, entity: &str) -> Result<CompiledFilter, FilterError> {
        self.validator().validate(node, entity)?;

        let root = lookup_entity(self.metadata, entity)?;
        let mut registry = AliasRegistry::default();
        let scope = Scope {
            entity: root,
            root_id: root.id,
            path: None,
        };
        let predicate = self.compile_model(node, &scope, &mut registry, false)?;
        let joins = registry.into_joins();

        tracing::debug!(entity = root.name, joins = joins.len(), "compiled filter");
        Ok(CompiledFilter {
            entity: root.name,
            id_column: root.id,
            joins,
            predicate,
        })
    }

    /// `negative` is the XOR of all `not` flags above this node. Negated
    /// groups are rewritten with De Morgan: the operator flips and the
    /// negation moves down to the leaves.
    fn compile_model(
        &self,
        node: &ModelFilterNode,
        scope: &Scope<'a>,
        registry: &mut AliasRegistry,
        negative: bool,
    ) -> Result<Predicate, FilterError> {
        let negative = negative ^ node.negative;

        // An empty group must not match everything or nothing by accident.
        if node.items.is_empty() {
            let guard = Predicate::IsNotNull(ColumnRef::new(None, scope.root_id));
            return Ok(guard.negate_if(negative));
        }

        let mut parts = Vec::with_capacity(node.items.len());
        for item in &node.items {
            let part = match item {
                FilterNode::Model(child) => {
                    let child_scope = match child.path.as_deref() {
                        Some(path) => self.enter(scope, path, registry)?,
                        None => scope.clone(),
                    };
                    self.compile_model(child, &child_scope, registry, negative)?
                }
                FilterNode::Value(child) => self.compile_value(child, scope, registry, negative)?,
            };
            parts.push(part);
        }

        let operator = if negative { node.operator.dual() } else { node.operator };
        Ok(match operator {
            ModelOperator::And => Predicate::All(parts),
            ModelOperator::Or => Predicate::Any(parts),
        })
    }

    /// Walks a relation path, registering a left join for each hop.
    fn enter(&self, scope: &Scope<'a>, path: &str, registry: &mut AliasRegistry) -> Result<Scope<'a>, FilterError> {
        let mut current = scope.clone();
        for segment in path.split('.').map(str::trim) {
            let property = current
                .entity
                .property(segment)
                .ok_or_else(|| FilterError::missing_property(segment, current.entity.name))?;
            let (target, column, kind) = match property.kind {
                PropertyKind::Reference { target, column } => (target, column, JoinKind::Reference),
                PropertyKind::Collection { target, column } => (target, column, JoinKind::Collection),
                _ => {
                    return Err(FilterError::UnexpectedType(format!(
                        "{}.{}",
                        current.entity.name, property.name
                    )))
                }
            };
            let target = lookup_entity(self.metadata, target)?;

            let relation_path = match &current.path {
                Some(parent) => format!("{parent}.{segment}"),
                None => segment.to_string(),
            };
            registry.register(JoinAlias {
                alias: JoinAlias::alias_for(&relation_path),
                path: relation_path.clone(),
                parent: current.alias(),
                entity: target.name,
                kind,
                column,
                parent_id: current.entity.id,
                target_id: target.id,
            });

            current = Scope {
                entity: target,
                root_id: current.root_id,
                path: Some(relation_path),
            };
        }
        Ok(current)
    }

    fn compile_value(
        &self,
        node: &ValueFilterNode,
        scope: &Scope<'a>,
        registry: &mut AliasRegistry,
        negative: bool,
    ) -> Result<Predicate, FilterError> {
        let negative = negative ^ node.negative;
        let path = node.path.as_deref().ok_or(FilterError::EmptyNodePath)?;

        let (owner, name) = match path.rsplit_once('.') {
            Some((relations, last)) => (self.enter(scope, relations, registry)?, last.trim()),
            None => (scope.clone(), path),
        };
        let property = owner
            .entity
            .property(name)
            .ok_or_else(|| FilterError::missing_property(name, owner.entity.name))?;

        let column = match property.kind {
            PropertyKind::Text | PropertyKind::Value(_) => owner.column(property.name),
            // compare the foreign key, no join needed
            PropertyKind::Reference { column, .. } => owner.column(column),
            PropertyKind::Collection { .. } => {
                let element = self.enter(&owner, property.name, registry)?;
                element.column(element.entity.id)
            }
        };

        let predicate = match node.operator {
            ValueOperator::Exists => Predicate::IsNotNull(column),
            ValueOperator::Like => {
                let raw = node.operand.as_deref().unwrap_or_default().trim();
                Predicate::Like {
                    column,
                    mode: MatchMode::from_markers(raw, self.wildcard),
                    text: raw.replace(self.wildcard, ""),
                }
            }
            op => {
                let invalid = || FilterError::invalid_operand(property.name, owner.entity.name);
                let raw = node.operand.as_deref().ok_or_else(invalid)?;
                let value = self.validator().convert(property, raw).ok_or_else(invalid)?;
                let widen = !property.timestamp
                    && matches!(property.kind, PropertyKind::Value(ValueType::DateTime));
                self.compare(column, op, value, widen).ok_or_else(invalid)?
            }
        };

        Ok(predicate.negate_if(negative))
    }

    /// Builds a comparison. With `widen`, a date operand stands for its whole
    /// local calendar day `[start, next)`.
    fn compare(&self, column: ColumnRef, op: ValueOperator, value: FilterValue, widen: bool) -> Option<Predicate> {
        let compare = |column: ColumnRef, op: CompareOp, value: FilterValue| Predicate::Compare { column, op, value };

        if let (true, FilterValue::DateTime(instant)) = (widen, &value) {
            let day = self.zone.day_bounds(*instant)?;
            let start = FilterValue::DateTime(day.start);
            let next = FilterValue::DateTime(day.next);
            return Some(match op {
                ValueOperator::Eq => Predicate::All(vec![
                    compare(column.clone(), CompareOp::Ge, start),
                    compare(column, CompareOp::Lt, next),
                ]),
                ValueOperator::Lt => compare(column, CompareOp::Lt, start),
                ValueOperator::Gt => compare(column, CompareOp::Ge, next),
                ValueOperator::Le => compare(column, CompareOp::Lt, next),
                ValueOperator::Ge => compare(column, CompareOp::Ge, start),
                ValueOperator::Like | ValueOperator::Exists => return None,
            });
        }

        let op = match op {
            ValueOperator::Eq => CompareOp::Eq,
            ValueOperator::Gt => CompareOp::Gt,
            ValueOperator::Lt => CompareOp::Lt,
            ValueOperator::Ge => CompareOp::Ge,
            ValueOperator::Le => CompareOp::Le,
            ValueOperator::Like | ValueOperator::Exists => return None,
        };
        Some(compare(column, op, value))
    }
}
