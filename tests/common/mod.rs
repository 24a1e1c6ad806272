//! In-memory entity store that executes compiled filters over JSON rows.
//!
//! Joins are evaluated as left outer joins: every root row is combined with
//! every matching row of each alias, or with a null row when nothing
//! matches. Comparisons follow SQL three-valued logic and a root row is
//! returned when any of its combinations evaluates to true.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use filter_engine::demo;
use filter_engine::sql_compiler::{ColumnRef, CompareOp, JoinAlias, JoinKind};
use filter_engine::{
    CompiledFilter, FilterConfig, FilterService, FilterValue, ModelRegistry, Predicate, TimeZoneSetting,
};

pub type Row = Map<String, Value>;

#[derive(Debug, Default)]
pub struct EntityStore {
    tables: HashMap<String, Vec<Row>>,
}

type Bindings<'s> = HashMap<Option<String>, Option<&'s Row>>;

impl EntityStore {
    pub fn insert(&mut self, entity: &str, row: Value) {
        if let Value::Object(row) = row {
            self.tables.entry(entity.to_string()).or_default().push(row);
        }
    }

    fn rows(&self, entity: &str) -> &[Row] {
        self.tables.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Identifiers of root rows matched by `filter`.
    pub fn query(&self, filter: &CompiledFilter) -> BTreeSet<i64> {
        self.rows(filter.entity)
            .iter()
            .filter(|row| {
                let mut bindings = Bindings::new();
                bindings.insert(None, Some(*row));
                self.combinations(&filter.joins, bindings)
                    .iter()
                    .any(|combo| eval(&filter.predicate, combo) == Some(true))
            })
            .filter_map(|row| row.get(filter.id_column).and_then(Value::as_i64))
            .collect()
    }

    fn combinations<'s>(&'s self, joins: &[JoinAlias], bindings: Bindings<'s>) -> Vec<Bindings<'s>> {
        let Some((join, rest)) = joins.split_first() else {
            return vec![bindings];
        };

        let parent = bindings.get(&join.parent).copied().flatten();
        let mut matches: Vec<Option<&Row>> = match parent {
            None => Vec::new(),
            Some(parent) => self
                .rows(join.entity)
                .iter()
                .filter(|candidate| joined(join, parent, candidate))
                .map(Some)
                .collect(),
        };
        if matches.is_empty() {
            matches.push(None);
        }

        matches
            .into_iter()
            .flat_map(|row| {
                let mut next = bindings.clone();
                next.insert(Some(join.alias.clone()), row);
                self.combinations(rest, next)
            })
            .collect()
    }
}

fn joined(join: &JoinAlias, parent: &Row, candidate: &Row) -> bool {
    let (left, right) = match join.kind {
        JoinKind::Reference => (candidate.get(join.target_id), parent.get(join.column)),
        JoinKind::Collection => (candidate.get(join.column), parent.get(join.parent_id)),
    };
    match (left, right) {
        (Some(l), Some(r)) => !l.is_null() && l == r,
        _ => false,
    }
}

fn lookup<'a>(column: &ColumnRef, bindings: &Bindings<'a>) -> Option<&'a Value> {
    let row = bindings.get(&column.table).copied().flatten()?;
    row.get(&column.column).filter(|value| !value.is_null())
}

fn as_filter_value(value: &Value, like: &FilterValue) -> Option<FilterValue> {
    match like {
        FilterValue::Bool(_) => value.as_bool().map(FilterValue::Bool),
        FilterValue::Int(_) => value.as_i64().map(FilterValue::Int),
        FilterValue::Float(_) => value.as_f64().map(FilterValue::Float),
        FilterValue::Text(_) => value.as_str().map(|s| FilterValue::Text(s.to_string())),
        FilterValue::DateTime(_) => value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| FilterValue::DateTime(dt.with_timezone(&Utc))),
        FilterValue::Uuid(_) => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(FilterValue::Uuid),
    }
}

/// Evaluates with three-valued logic; `None` is unknown.
fn eval(predicate: &Predicate, bindings: &Bindings<'_>) -> Option<bool> {
    match predicate {
        Predicate::All(parts) => parts.iter().try_fold(Some(true), |acc, part| match eval(part, bindings) {
            Some(false) => Err(()),
            Some(true) => Ok(acc),
            None => Ok(None),
        })
        .unwrap_or(Some(false)),
        Predicate::Any(parts) => parts.iter().try_fold(Some(false), |acc, part| match eval(part, bindings) {
            Some(true) => Err(()),
            Some(false) => Ok(acc),
            None => Ok(None),
        })
        .map_or(Some(true), |acc| acc),
        Predicate::Not(inner) => eval(inner, bindings).map(|b| !b),
        Predicate::Compare { column, op, value } => {
            let actual = as_filter_value(lookup(column, bindings)?, value)?;
            let ordering = actual.compare(value)?;
            Some(match op {
                CompareOp::Eq => ordering.is_eq(),
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Ge => ordering.is_ge(),
                CompareOp::Le => ordering.is_le(),
            })
        }
        Predicate::Like { column, text, mode } => {
            let actual = lookup(column, bindings)?.as_str()?;
            Some(mode.matches(actual, text))
        }
        Predicate::IsNull(column) => Some(lookup(column, bindings).is_none()),
        Predicate::IsNotNull(column) => Some(lookup(column, bindings).is_some()),
    }
}

/// Task tracker fixture.
pub fn fixture() -> EntityStore {
    let mut store = EntityStore::default();

    store.insert("Department", json!({"Id": 1, "Name": "R&D"}));
    store.insert("Department", json!({"Id": 2, "Name": "Sales"}));

    store.insert("User", json!({"Id": 1, "Name": "Ann", "DepartmentId": 1}));
    store.insert("User", json!({"Id": 2, "Name": "Bob", "DepartmentId": 2}));
    store.insert("User", json!({"Id": 3, "Name": "Cid", "DepartmentId": null}));

    store.insert("Project", json!({"Id": 1, "Name": "Apollo"}));

    store.insert("Task", json!({
        "Id": 1, "Name": "Alpha", "Priority": 1, "Estimate": 2.5, "Done": false,
        "DueDate": "2020-03-15T00:00:00Z", "CreatedAt": "2020-03-01T08:30:00Z",
        "Status": "Open", "OwnerId": 1, "ProjectId": 1
    }));
    store.insert("Task", json!({
        "Id": 2, "Name": "Alphabet", "Priority": 2, "Estimate": 1.0, "Done": true,
        "DueDate": "2020-03-15T23:59:59Z", "CreatedAt": "2020-03-02T08:30:00Z",
        "Status": "Closed", "OwnerId": 2, "ProjectId": 1
    }));
    store.insert("Task", json!({
        "Id": 3, "Name": "Beta", "Priority": 3, "Estimate": 8.0, "Done": false,
        "DueDate": "2020-03-16T00:00:00Z", "CreatedAt": "2020-03-03T08:30:00Z",
        "Status": "InProgress", "OwnerId": null, "ProjectId": null
    }));
    store.insert("Task", json!({
        "Id": 4, "Name": "Gamma", "Priority": null, "Estimate": null, "Done": false,
        "DueDate": "2020-03-14T23:59:59Z", "CreatedAt": "2020-03-04T08:30:00Z",
        "Status": "Open", "OwnerId": 3, "ProjectId": 1
    }));

    store.insert("Tag", json!({"Id": 1, "Name": "bug", "TaskId": 1}));
    store.insert("Tag", json!({"Id": 2, "Name": "ui", "TaskId": 1}));
    store.insert("Tag", json!({"Id": 3, "Name": "bug", "TaskId": 3}));

    store
}

pub fn service_in(zone: &str) -> FilterService<ModelRegistry> {
    let zone: TimeZoneSetting = zone.parse().expect("valid zone");
    let config = FilterConfig::default().with_time_zone(zone);
    FilterService::new(demo::registry(), config).expect("valid config")
}

pub fn service() -> FilterService<ModelRegistry> {
    service_in("utc")
}

/// Parses, compiles against `Task` and runs `input` on the fixture.
pub fn run(service: &FilterService<ModelRegistry>, input: &str) -> BTreeSet<i64> {
    let node = service.parse(input).expect("parse");
    let compiled = service.compile(&node, "Task").expect("compile");
    fixture().query(&compiled)
}

pub fn ids(values: &[i64]) -> BTreeSet<i64> {
    values.iter().copied().collect()
}
